//! Literal rendering: quoted text, numbers in the host runtime's canonical
//! form, and attribute-name syntax.

/// `^[A-Za-z_$][A-Za-z0-9_$]*$`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Quote `s`, preferring single quotes unless the text holds a single
/// quote and no double quote.
pub fn text(s: &str) -> String {
    let double = s.contains('\'') && !s.contains('"');
    let quote = if double { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Render `n` the way the host runtime's number-to-text conversion does.
pub fn number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    let sign = if n < 0.0 { "-" } else { "" };

    // `{:e}` yields the shortest round-tripping digits: `d[.ddd]e<exp>`.
    let sci = format!("{:e}", n.abs());
    let (mantissa, exp) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return format!("{}{}", sign, sci),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exp: i32 = exp.parse().unwrap_or(0);
    let k = digits.len() as i32;
    let point = exp + 1;

    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let e = point - 1;
        let e_sign = if e >= 0 { "+" } else { "-" };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, e_sign, e.abs())
        } else {
            format!("{}.{}e{}{}", first, rest, e_sign, e.abs())
        }
    };
    format!("{}{}", sign, body)
}

/// Attribute access syntax appended to an expression: `.name`, `[5]` or
/// `['odd name']`.
pub fn attribute_access(name: &str) -> String {
    if is_identifier(name) {
        return format!(".{}", name);
    }
    if let Ok(n) = name.parse::<f64>() {
        if number(n) == name {
            return format!("[{}]", name);
        }
    }
    format!("[{}]", text(name))
}

/// Key syntax inside a brace literal: bare when it is an identifier or a
/// canonical non-negative number, quoted otherwise.
pub fn map_key(name: &str) -> String {
    if is_identifier(name) {
        return name.to_owned();
    }
    let numeric = !name.is_empty() && name.chars().all(|c| c.is_ascii_digit() || c == '.');
    if numeric {
        if let Ok(n) = name.parse::<f64>() {
            if number(n) == name {
                return name.to_owned();
            }
        }
    }
    text(name)
}
