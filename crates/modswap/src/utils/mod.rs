use colored::Colorize;

pub mod config;
pub mod logging;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

/// Marker shown in front of the active entry of a listing.
pub fn active_marker(active: bool) -> String {
    if active {
        "●".bright_green().bold().to_string()
    } else {
        "○".dimmed().to_string()
    }
}

/// Formats `count` with a singular or plural noun.
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
