//! Multi-tap keypad text decoding.
//!
//! Pressing a key repeatedly cycles through its letters (`2` a, `22` b,
//! `222` c, `2222` a again). A different key or the separator `*` ends the
//! current letter. `0` is a space and `1` cycles through punctuation.

use dialtone_types::keys::TEXT_SEPARATOR;

fn letters(key: char) -> Option<&'static [char]> {
    let group: &'static [char] = match key {
        '0' => &[' '],
        '1' => &['.', ',', '?', '!', '\''],
        '2' => &['a', 'b', 'c'],
        '3' => &['d', 'e', 'f'],
        '4' => &['g', 'h', 'i'],
        '5' => &['j', 'k', 'l'],
        '6' => &['m', 'n', 'o'],
        '7' => &['p', 'q', 'r', 's'],
        '8' => &['t', 'u', 'v'],
        '9' => &['w', 'x', 'y', 'z'],
        _ => return None,
    };
    Some(group)
}

/// Decodes a raw key sequence into text. Unknown keys are ignored.
pub fn decode(keys: &str) -> String {
    let mut text = String::new();
    let mut run: Option<(char, usize)> = None;

    for key in keys.chars() {
        if key == TEXT_SEPARATOR {
            flush(&mut run, &mut text);
            continue;
        }
        if letters(key).is_none() {
            continue;
        }
        match run {
            Some((current, ref mut presses)) if current == key => *presses += 1,
            _ => {
                flush(&mut run, &mut text);
                run = Some((key, 1));
            }
        }
    }
    flush(&mut run, &mut text);

    text
}

fn flush(run: &mut Option<(char, usize)>, text: &mut String) {
    if let Some((key, presses)) = run.take() {
        if let Some(group) = letters(key) {
            text.push(group[(presses - 1) % group.len()]);
        }
    }
}
