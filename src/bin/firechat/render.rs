//! Plain-text rendering of the mounted screen.

use crate::LoginStep;
use firechat::chat::client::{ChatClient, Screen};
use firechat::chat::feed::LiveFeedController;
use firechat::chat::form::{AuthMode, CredentialForm, WELCOME_TEXT};

const EMOJI_CHOICES: [&str; 10] = ["😀", "😂", "😍", "😎", "👍", "🙏", "🎉", "🔥", "❤️", "😢"];

pub fn screen(client: &ChatClient, step: LoginStep) {
    match client.screen() {
        Screen::Login(form) => login(form, step),
        Screen::ChatRoom(feed) => chat_room(feed),
    }
}

pub fn notice(text: &str) {
    println!("  ! {text}");
}

fn login(form: &CredentialForm, step: LoginStep) {
    let (title, other) = match form.mode() {
        AuthMode::SignIn => ("Sign in", "sign up"),
        AuthMode::SignUp => ("Sign up", "sign in"),
    };

    println!();
    println!("{WELCOME_TEXT}");
    println!("{title}  (/toggle to {other}, /quit to exit)");
    if let Some(alert) = form.alert() {
        println!("  ! {alert}");
    }
    match step {
        LoginStep::Email if form.email().is_empty() => println!("email:"),
        LoginStep::Email => println!("email [{}]:", form.email()),
        LoginStep::Password => println!("password for {}:", form.email()),
    }
}

fn chat_room(feed: &LiveFeedController) {
    let rows = feed.rows();
    let first = feed.scroll_offset();
    let last = (first + feed.viewport_rows()).min(rows.len());

    println!();
    match feed.session() {
        Some(session) => println!("== Chat == signed in as {} (/logout)", session.email),
        None => println!("== Chat =="),
    }
    if first > 0 {
        println!("  ... {first} earlier");
    }

    for (i, row) in rows.iter().enumerate().take(last).skip(first) {
        let marker = if row.selected { '*' } else { ' ' };
        if row.starts_run {
            println!(
                "{marker}{:>3}  [{} {}] {}: {}",
                i + 1,
                row.avatar_initial,
                row.avatar_color,
                row.label,
                row.message.text
            );
        } else {
            println!("{marker}{:>3}  {:>w$}  {}", i + 1, "", row.message.text, w = 10);
        }
        if row.can_delete {
            println!("       /delete to remove this message");
        }
    }

    if feed.emoji_picker_open() {
        println!("  emoji: {}  (/emoji <e> to add)", EMOJI_CHOICES.join(" "));
    }
    if !feed.input().is_empty() {
        println!("> {}", feed.input());
    }
}
