/// Longest overlay text, in characters.
pub const MAX_OVERLAY_CHARS: usize = 60;

const QUOTES: [char; 7] = ['\'', '"', '`', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'];

// Structural characters of the filtergraph / drawtext option syntax.
const SEPARATORS: [char; 6] = [':', '[', ']', ',', ';', '\\'];

/// Make free text safe to embed in a drawtext filter.
///
/// Quotes are dropped, filtergraph separators become spaces, whitespace runs
/// collapse to one space and the result is cut to [`MAX_OVERLAY_CHARS`].
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_OVERLAY_CHARS * 4));
    let mut pending_space = false;
    let mut count = 0;

    for c in text.chars() {
        if QUOTES.contains(&c) {
            continue;
        }
        if c.is_whitespace() || SEPARATORS.contains(&c) {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            if count + 1 >= MAX_OVERLAY_CHARS {
                break;
            }
            out.push(' ');
            count += 1;
            pending_space = false;
        }
        if count == MAX_OVERLAY_CHARS {
            break;
        }
        out.push(c);
        count += 1;
    }

    out
}
