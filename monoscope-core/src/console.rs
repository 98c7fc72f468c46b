use crate::health::HealthStatus;
use crate::graph::CycleSeverity;
use std::env;
use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

fn use_color() -> bool {
    static USE_COLOR: OnceLock<bool> = OnceLock::new();
    *USE_COLOR.get_or_init(|| env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal())
}

fn is_tty() -> bool {
    static IS_TTY: OnceLock<bool> = OnceLock::new();
    *IS_TTY.get_or_init(|| io::stderr().is_terminal())
}

fn paint(code: &str, text: &str) -> String {
    if use_color() {
        format!("\u{1b}[{}m{}\u{1b}[0m", code, text)
    } else {
        text.to_string()
    }
}

pub fn dim(text: &str) -> String {
    paint("2", text)
}

pub fn bold(text: &str) -> String {
    paint("1", text)
}

fn green(text: &str) -> String {
    paint("32", text)
}

fn cyan(text: &str) -> String {
    paint("36", text)
}

fn yellow(text: &str) -> String {
    paint("33", text)
}

fn red(text: &str) -> String {
    paint("31", text)
}

pub fn elapsed_ms() -> u128 {
    START_TIME
        .get()
        .map(|t| t.elapsed().as_millis())
        .unwrap_or(0)
}

pub fn header(command: &str, version: &str) {
    START_TIME.get_or_init(Instant::now);
    eprintln!("{}", dim(&format!("monoscope {} v{}", command, version)));
    eprintln!();
}

pub fn step(message: &str) {
    if is_tty() {
        eprint!("\r\u{1b}[K{}\n", dim(message));
        let _ = io::stderr().flush();
    } else {
        eprintln!("{}", dim(message));
    }
}

pub fn step_with_count(message: &str, count: usize) {
    eprintln!("{} {}", message, cyan(&format!("[{}]", count)));
}

pub fn status_badge(status: HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => green("healthy"),
        HealthStatus::Warning => yellow("warning"),
        HealthStatus::Error => red("error"),
    }
}

pub fn severity_badge(severity: CycleSeverity) -> String {
    match severity {
        CycleSeverity::High => red("high"),
        CycleSeverity::Medium => yellow("medium"),
        CycleSeverity::Low => dim("low"),
    }
}

pub fn score(value: u8) -> String {
    let text = format!("{:>3}", value);
    match HealthStatus::from_score(value) {
        HealthStatus::Healthy => green(&text),
        HealthStatus::Warning => yellow(&text),
        HealthStatus::Error => red(&text),
    }
}

pub fn summary(message: &str) {
    println!();
    let ms = elapsed_ms();
    let time_str = if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.2}s", ms as f64 / 1000.0)
    };
    println!("{} {}", message, dim(&format!("[{}]", time_str)));
}

pub fn warn(message: &str) {
    let tag = yellow("warn");
    eprintln!("{} {}", tag, message);
}

pub fn error(message: &str) {
    let tag = red("error");
    eprintln!("{} {}", tag, message);
}

pub fn info(message: &str) {
    println!("{}", message);
}
