//! 时间窗口采样
//!
//! 从切分后的字段中取出时间文本并解析为 Unix 秒。
//! 解析失败返回 `TimestampError`，调用方必须把它当作“跳过”，而不是中止扫描。

use chrono::format::{parse, Parsed, StrftimeItems};
use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::TimestampError;
use crate::models::{SearchRequest, TimeWindow};
use crate::utils::{split_tokens, translate, ChronoLayout};

/// 预筛选时的宽松比较方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// 文件头时间与窗口结束时间比较
    Head,
    /// 文件尾时间与窗口开始时间比较
    Tail,
}

impl SampleMode {
    /// 边界放宽一秒：头部 `ts < reference + 1`，尾部 `ts > reference - 1`
    pub fn admits(self, ts: i64, reference: i64) -> bool {
        match self {
            SampleMode::Head => ts < reference.saturating_add(1),
            SampleMode::Tail => ts > reference.saturating_sub(1),
        }
    }
}

/// 按字段位置和日期格式解析时间戳
#[derive(Debug, Clone)]
pub struct TimestampParser {
    /// 1 起始的字段位置
    positions: Vec<usize>,
    layout: ChronoLayout,
    /// 年份推断用的“当前时间”，构造时固定
    now: DateTime<Local>,
}

type ParsedParts = (NaiveDate, NaiveTime, Option<FixedOffset>);

/// 无年份格式推断月份时使用的闰年
const LEAP_YEAR: i32 = 2000;

impl TimestampParser {
    pub fn new(positions: &[usize], date_format: &str) -> Self {
        Self {
            positions: positions.to_vec(),
            layout: translate(date_format),
            now: Local::now(),
        }
    }

    /// 替换年份推断使用的当前时间
    pub fn with_now(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    pub fn layout(&self) -> &ChronoLayout {
        &self.layout
    }

    /// 取出配置位置上的字段，用空格拼接
    pub fn date_text(&self, tokens: &[String]) -> Result<String, TimestampError> {
        let mut parts = Vec::with_capacity(self.positions.len());
        for &position in &self.positions {
            let token = position
                .checked_sub(1)
                .and_then(|index| tokens.get(index))
                .ok_or(TimestampError::MissingToken {
                    position,
                    available: tokens.len(),
                })?;
            parts.push(token.as_str());
        }
        Ok(parts.join(" "))
    }

    pub fn parse(&self, tokens: &[String]) -> Result<i64, TimestampError> {
        let text = self.date_text(tokens)?;
        self.parse_text(&text)
    }

    /**
     * 解析时间文本
     *
     * 格式不含年份时补年份：默认今年；解析出的月份晚于当前月份时
     * 认为是去年的日志（跨年）。
     */
    pub fn parse_text(&self, text: &str) -> Result<i64, TimestampError> {
        if self.layout.format.contains("%s") {
            return self.parse_epoch(text);
        }

        let (date, time, offset) = if self.layout.has_year {
            self.parse_parts(text, None)?
        } else {
            // 先用闰年解析出月份，2 月 29 日才不会因为今年不是闰年而失败
            let (leap_date, _, _) = self.parse_parts(text, Some(LEAP_YEAR))?;
            let year = if leap_date.month() > self.now.month() {
                self.now.year() - 1
            } else {
                self.now.year()
            };
            self.parse_parts(text, Some(year))?
        };

        to_unix(text, date.and_time(time), offset)
    }

    /// `%s` 格式直接给出 Unix 秒，与时区无关
    fn parse_epoch(&self, text: &str) -> Result<i64, TimestampError> {
        let unparseable = |reason: String| TimestampError::Unparseable {
            input: text.to_string(),
            format: self.layout.format.clone(),
            reason,
        };
        let mut parsed = Parsed::new();
        parse(&mut parsed, text, StrftimeItems::new(&self.layout.format)).map_err(|e| unparseable(e.to_string()))?;
        parsed
            .to_datetime_with_timezone(&Utc)
            .map(|dt| dt.timestamp())
            .map_err(|e| unparseable(e.to_string()))
    }

    fn parse_parts(&self, text: &str, year: Option<i32>) -> Result<ParsedParts, TimestampError> {
        let unparseable = |reason: String| TimestampError::Unparseable {
            input: text.to_string(),
            format: self.layout.format.clone(),
            reason,
        };

        let mut parsed = Parsed::new();
        let result = match year {
            Some(year) => {
                let format = format!("{} %Y", self.layout.format);
                let input = format!("{} {}", text, year);
                parse(&mut parsed, &input, StrftimeItems::new(&format))
            }
            None => parse(&mut parsed, text, StrftimeItems::new(&self.layout.format)),
        };
        result.map_err(|e| unparseable(e.to_string()))?;

        let date = parsed.to_naive_date().map_err(|e| unparseable(e.to_string()))?;
        // 只有日期没有时间时按当天零点
        let time = parsed.to_naive_time().unwrap_or(NaiveTime::MIN);
        let offset = if self.layout.has_offset {
            Some(parsed.to_fixed_offset().map_err(|e| unparseable(e.to_string()))?)
        } else {
            None
        };
        Ok((date, time, offset))
    }
}

fn to_unix(text: &str, naive: NaiveDateTime, offset: Option<FixedOffset>) -> Result<i64, TimestampError> {
    let nonexistent = || TimestampError::NonexistentLocalTime {
        input: text.to_string(),
    };
    match offset {
        Some(offset) => offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.timestamp())
            .ok_or_else(nonexistent),
        None => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
            .ok_or_else(nonexistent),
    }
}

/**
 * 行级时间采样器
 *
 * 把一行切分成字段再解析时间戳；预筛选和全量扫描共用同一套切分规则。
 */
#[derive(Debug, Clone)]
pub struct TimeWindowSampler {
    parser: TimestampParser,
    delimiter: String,
    collapse_empty: bool,
}

impl TimeWindowSampler {
    pub fn new(parser: TimestampParser, delimiter: impl Into<String>, collapse_empty: bool) -> Self {
        Self {
            parser,
            delimiter: delimiter.into(),
            collapse_empty,
        }
    }

    pub fn from_request(request: &SearchRequest) -> Self {
        Self::new(
            TimestampParser::new(&request.date_positions, &request.date_format),
            request.delimiter.clone(),
            request.collapse_empty_tokens,
        )
    }

    pub fn with_now(self, now: DateTime<Local>) -> Self {
        Self {
            parser: self.parser.with_now(now),
            ..self
        }
    }

    pub fn tokenize(&self, line: &str) -> Vec<String> {
        split_tokens(line, &self.delimiter, self.collapse_empty)
    }

    /// 解析一行的时间戳
    pub fn sample(&self, line: &str) -> Result<i64, TimestampError> {
        self.parser.parse(&self.tokenize(line))
    }

    /// 严格模式：时间戳可解析且落在窗口内（两端包含）时返回它
    pub fn strict(&self, tokens: &[String], window: &TimeWindow) -> Option<i64> {
        self.parser
            .parse(tokens)
            .ok()
            .filter(|&ts| window.contains(ts))
    }

    pub fn parser(&self) -> &TimestampParser {
        &self.parser
    }
}
