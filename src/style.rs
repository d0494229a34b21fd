use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Timelike};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    Hour12,
    Hour24,
}

impl TimeFormat {
    pub fn is_24h(&self) -> bool {
        matches!(self, TimeFormat::Hour24)
    }

    pub fn toggled(&self) -> Self {
        match self {
            TimeFormat::Hour12 => TimeFormat::Hour24,
            TimeFormat::Hour24 => TimeFormat::Hour12,
        }
    }

    pub fn as_hours(&self) -> u32 {
        match self {
            TimeFormat::Hour12 => 12,
            TimeFormat::Hour24 => 24,
        }
    }

    pub fn from_hours(hours: u32) -> Option<Self> {
        match hours {
            12 => Some(TimeFormat::Hour12),
            24 => Some(TimeFormat::Hour24),
            _ => None,
        }
    }
}

/// Clock faces. Rendering is the front-end's concern; each face here is a
/// pure string formatter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClockStyle {
    #[default]
    Digital,
    Binary,
    Text,
}

impl ClockStyle {
    pub const ALL: [ClockStyle; 3] = [ClockStyle::Digital, ClockStyle::Binary, ClockStyle::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClockStyle::Digital => "digital",
            ClockStyle::Binary => "binary",
            ClockStyle::Text => "text",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClockStyle::Digital => "Digital",
            ClockStyle::Binary => "Binary",
            ClockStyle::Text => "Text",
        }
    }

    /// The word-clock face has minute resolution only.
    pub fn supports_seconds(&self) -> bool {
        !matches!(self, ClockStyle::Text)
    }

    pub fn cycled(&self) -> Self {
        match self {
            ClockStyle::Digital => ClockStyle::Binary,
            ClockStyle::Binary => ClockStyle::Text,
            ClockStyle::Text => ClockStyle::Digital,
        }
    }
}

impl FromStr for ClockStyle {
    type Err = ();

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "digital" => Ok(ClockStyle::Digital),
            "binary" => Ok(ClockStyle::Binary),
            "text" => Ok(ClockStyle::Text),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ClockStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn format_time(
    style: ClockStyle,
    time: NaiveTime,
    format: TimeFormat,
    show_seconds: bool,
) -> String {
    match style {
        ClockStyle::Digital => format_digital(time, format, show_seconds),
        ClockStyle::Binary => format_binary(time, show_seconds),
        ClockStyle::Text => format_text(time, format),
    }
}

pub fn format_digital(time: NaiveTime, format: TimeFormat, show_seconds: bool) -> String {
    match (format, show_seconds) {
        (TimeFormat::Hour24, true) => format!(
            "{:02}:{:02}:{:02}",
            time.hour(),
            time.minute(),
            time.second()
        ),
        (TimeFormat::Hour24, false) => format!("{:02}:{:02}", time.hour(), time.minute()),
        (TimeFormat::Hour12, with_seconds) => {
            let (is_pm, hour12) = time.hour12();
            let meridiem = if is_pm { "PM" } else { "AM" };
            if with_seconds {
                format!(
                    "{:02}:{:02}:{:02} {}",
                    hour12,
                    time.minute(),
                    time.second(),
                    meridiem
                )
            } else {
                format!("{:02}:{:02} {}", hour12, time.minute(), meridiem)
            }
        }
    }
}

/// Bit rows per component: 5 bits for the hour, 6 for minute and second.
pub fn format_binary(time: NaiveTime, show_seconds: bool) -> String {
    if show_seconds {
        format!(
            "{:05b} {:06b} {:06b}",
            time.hour(),
            time.minute(),
            time.second()
        )
    } else {
        format!("{:05b} {:06b}", time.hour(), time.minute())
    }
}

/// Word clock: "It's Quarter Past Nine PM", "It's Twenty-Five To Ten".
pub fn format_text(time: NaiveTime, format: TimeFormat) -> String {
    let minute = time.minute();
    let (mut hour, meridiem) = display_hour(time, format);

    let phrase = match minute {
        0 => format!("{} o'clock", hour_words(hour)),
        15 => format!("quarter past {}", hour_words(hour)),
        30 => format!("half past {}", hour_words(hour)),
        45 => {
            hour = next_hour(hour, format);
            format!("quarter to {}", hour_words(hour))
        }
        m if m < 30 => format!("{} past {}", number_words(m), hour_words(hour)),
        m => {
            hour = next_hour(hour, format);
            format!("{} to {}", number_words(60 - m), hour_words(hour))
        }
    };

    let mut text = format!("It's {}", title_words(&phrase));
    if let Some(meridiem) = meridiem {
        text.push(' ');
        text.push_str(meridiem);
    }
    text
}

fn display_hour(time: NaiveTime, format: TimeFormat) -> (u32, Option<&'static str>) {
    match format {
        TimeFormat::Hour24 => (time.hour(), None),
        TimeFormat::Hour12 => {
            let (is_pm, hour12) = time.hour12();
            (hour12, Some(if is_pm { "PM" } else { "AM" }))
        }
    }
}

fn next_hour(hour: u32, format: TimeFormat) -> u32 {
    match format {
        TimeFormat::Hour24 => (hour + 1) % 24,
        TimeFormat::Hour12 => {
            if hour == 12 {
                1
            } else {
                hour + 1
            }
        }
    }
}

fn hour_words(hour: u32) -> String {
    if hour == 0 {
        "midnight".to_string()
    } else {
        number_words(hour)
    }
}

fn number_words(n: u32) -> String {
    const ONES: [&str; 20] = [
        "zero",
        "one",
        "two",
        "three",
        "four",
        "five",
        "six",
        "seven",
        "eight",
        "nine",
        "ten",
        "eleven",
        "twelve",
        "thirteen",
        "fourteen",
        "fifteen",
        "sixteen",
        "seventeen",
        "eighteen",
        "nineteen",
    ];
    const TENS: [&str; 6] = ["", "", "twenty", "thirty", "forty", "fifty"];

    match n {
        0..=19 => ONES[n as usize].to_string(),
        20..=59 => {
            let tens = TENS[(n / 10) as usize];
            if n % 10 == 0 {
                tens.to_string()
            } else {
                format!("{}-{}", tens, ONES[(n % 10) as usize])
            }
        }
        _ => n.to_string(),
    }
}

fn title_words(phrase: &str) -> String {
    let mut result = String::with_capacity(phrase.len());
    let mut at_word_start = true;
    for ch in phrase.chars() {
        if at_word_start {
            result.extend(ch.to_uppercase());
        } else {
            result.push(ch);
        }
        at_word_start = ch == ' ' || ch == '-';
    }
    result
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%A, %B %d, %Y").to_string()
}

/// Spoken form used by the "speak current time" action.
pub fn spoken_time(time: NaiveTime, format: TimeFormat) -> String {
    match format {
        TimeFormat::Hour24 => format!("The time is {:02} {:02}", time.hour(), time.minute()),
        TimeFormat::Hour12 => {
            let (is_pm, hour12) = time.hour12();
            format!(
                "The time is {} {:02} {}",
                hour12,
                time.minute(),
                if is_pm { "PM" } else { "AM" }
            )
        }
    }
}

/// Spoken form of the top-of-the-hour announcement.
pub fn hourly_announcement(time: NaiveTime, format: TimeFormat) -> String {
    match format {
        TimeFormat::Hour24 => format!("It's {} hundred hours", time.hour()),
        TimeFormat::Hour12 => {
            let (is_pm, hour12) = time.hour12();
            format!("It's {} {}", hour12, if is_pm { "PM" } else { "AM" })
        }
    }
}
