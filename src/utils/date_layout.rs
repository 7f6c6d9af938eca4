//! 日期格式转换
//!
//! 请求里的 `dateFormat` 使用参考时间布局（`2006-01-02 15:04:05`、
//! `Jan _2 15:04:05` 等），这里把它翻译成 chrono 的 strftime 格式。
//! 已经包含 `%` 的格式视为 strftime，原样返回。

/// 翻译后的格式及其特征
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChronoLayout {
    pub format: String,
    /// 格式中是否带年份；没有时需要推断
    pub has_year: bool,
    /// 格式中是否带时区偏移；没有时按本地时区解释
    pub has_offset: bool,
}

/// 参考布局片段与 strftime 的对应表，按优先级排列（长的在前）
const CHUNKS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Jan", "%b"),
    ("Monday", "%A"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("2006", "%Y"),
    ("-07:00:00", "%::z"),
    ("-07:00", "%:z"),
    ("-0700", "%z"),
    ("-07", "%#z"),
    ("Z07:00", "%:z"),
    ("Z0700", "%z"),
    ("002", "%j"),
    ("__2", "%j"),
    ("_2", "%e"),
    ("01", "%m"),
    ("02", "%d"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("15", "%H"),
    ("PM", "%p"),
    ("pm", "%p"),
    ("1", "%m"),
    ("2", "%d"),
    ("3", "%I"),
    ("4", "%M"),
    ("5", "%S"),
];

const YEAR_SPECIFIERS: &[&str] = &["%Y", "%y", "%G", "%g", "%C", "%s", "%+", "%c", "%D", "%F", "%x"];
const OFFSET_SPECIFIERS: &[&str] = &["%z", "%:z", "%::z", "%#z", "%+"];

/// 把参考时间布局翻译为 chrono 格式
pub fn translate(layout: &str) -> ChronoLayout {
    let format = if layout.contains('%') {
        layout.to_string()
    } else {
        translate_reference_layout(layout)
    };

    ChronoLayout {
        has_year: YEAR_SPECIFIERS.iter().any(|s| format.contains(s)),
        has_offset: OFFSET_SPECIFIERS.iter().any(|s| format.contains(s)),
        format,
    }
}

fn translate_reference_layout(layout: &str) -> String {
    let mut out = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    while !rest.is_empty() {
        if let Some((consumed, spec)) = fractional_seconds(rest) {
            out.push_str(spec);
            rest = &rest[consumed..];
            continue;
        }

        if let Some((chunk, spec)) = CHUNKS.iter().find(|(chunk, _)| rest.starts_with(chunk)) {
            out.push_str(spec);
            rest = &rest[chunk.len()..];
            continue;
        }

        // 非布局字符原样保留
        let Some(ch) = rest.chars().next() else {
            break;
        };
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    out
}

/// `.000` / `.999999` 之类的小数秒
fn fractional_seconds(rest: &str) -> Option<(usize, &'static str)> {
    let bytes = rest.as_bytes();
    if bytes.len() < 2 || (bytes[0] != b'.' && bytes[0] != b',') {
        return None;
    }
    let digit = bytes[1];
    if digit != b'0' && digit != b'9' {
        return None;
    }

    let run = bytes[1..].iter().take_while(|&&b| b == digit).count();
    // 后面紧跟数字说明不是小数秒，例如 ".0001"
    if bytes.get(1 + run).is_some_and(u8::is_ascii_digit) {
        return None;
    }

    let spec = match (digit, run) {
        (b'0', 3) => "%.3f",
        (b'0', 6) => "%.6f",
        (b'0', 9) => "%.9f",
        _ => "%.f",
    };
    Some((1 + run, spec))
}
