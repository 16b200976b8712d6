use std::{io, io::Write};

// read a string, falling back to the default when the answer is blank
pub fn read_text(prompt_text: &str, default: Option<&str>) -> io::Result<String> {
    match default {
        Some(value) => print!("{} [{}]:", prompt_text, value),
        None => print!("{}:", prompt_text),
    }

    let answer = read_line()?;

    if answer.is_empty() {
        Ok(default.unwrap_or_default().to_owned())
    } else {
        Ok(answer)
    }
}

// read a boolean (yes or no)
pub fn read_yes_or_no(prompt_text: &str, default: bool) -> io::Result<bool> {
    if default {
        print!("{} (Y/n):", prompt_text);
    } else {
        print!("{} (N/y):", prompt_text);
    }

    Ok(parse_yes_or_no(&read_line()?, default))
}

pub fn parse_yes_or_no(answer: &str, default: bool) -> bool {
    match answer.trim().to_lowercase().chars().next() {
        None => default,
        Some(first) => first == 'y',
    }
}

fn read_line() -> io::Result<String> {
    let mut text = String::new();
    io::stdout().flush()?;
    io::stdin().read_line(&mut text)?;
    Ok(text.trim().to_owned())
}
