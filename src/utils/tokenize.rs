/// 把一行日志按分隔符切成字段
///
/// `collapse_empty` 为 true 时丢弃空字段（连续分隔符视为一个）。
/// 行尾的 `\r` 会先去掉，CRLF 文件的最后一个字段因此保持干净。
pub fn split_tokens(line: &str, delimiter: &str, collapse_empty: bool) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if delimiter.is_empty() {
        return vec![line.to_string()];
    }

    let parts = line.split(delimiter);
    if collapse_empty {
        parts
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        parts.map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keeps_empty_tokens_by_default() {
        assert_eq!(split_tokens("a  b", " ", false), vec!["a", "", "b"]);
    }

    #[test]
    fn test_split_collapses_empty_tokens() {
        assert_eq!(split_tokens("Jan  2 10:00:00 host", " ", true), vec!["Jan", "2", "10:00:00", "host"]);
    }

    #[test]
    fn test_split_multi_char_delimiter_and_crlf() {
        assert_eq!(split_tokens("a||b||c\r", "||", false), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_empty_line() {
        assert_eq!(split_tokens("", " ", false), vec![""]);
        assert!(split_tokens("", " ", true).is_empty());
    }
}
