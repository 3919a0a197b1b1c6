//! URL パスの percent-encode（WebDAV と hub で共通）

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Encode each `/`-separated segment of `path`; separators are kept.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/backup/my notes/a#1.zip", "/backup/my%20notes/a%231.zip")]
    #[case("/", "/")]
    #[case("data/50%.json", "data/50%25.json")]
    #[case("ノート/a?b", "%E3%83%8E%E3%83%BC%E3%83%88/a%3Fb")]
    fn segments_are_encoded_and_separators_kept(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(encode_path(path), expected);
    }
}
