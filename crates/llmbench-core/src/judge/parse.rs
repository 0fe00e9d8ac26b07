use super::{JudgeParseError, JudgeVerdict, SCORE_RANGE};

/// Extracts (score, reason) from judge output.
///
/// Accepts the first JSON object in the text, or a `Score: n` line with an
/// optional `Reason:` line for judges that ignore the JSON instruction.
pub fn parse_verdict(raw: &str) -> Result<JudgeVerdict, JudgeParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(JudgeParseError::Empty);
    }

    let (score, reason) = match text.find('{') {
        Some(start) => match parse_json(&text[start..]) {
            Ok(v) => v,
            // prose with a stray brace may still carry a Score: line
            Err(json_err) => parse_lines(text).ok_or(json_err)?,
        },
        None => parse_lines(text).ok_or(JudgeParseError::NoVerdict)?,
    };

    if !SCORE_RANGE.contains(&score) {
        return Err(JudgeParseError::OutOfRange(score));
    }
    Ok(JudgeVerdict {
        score: score as i32,
        reason,
        raw: raw.to_string(),
    })
}

fn parse_json(segment: &str) -> Result<(i64, String), JudgeParseError> {
    let val: serde_json::Value = serde_json::Deserializer::from_str(segment)
        .into_iter::<serde_json::Value>()
        .next()
        .ok_or(JudgeParseError::NoVerdict)?
        .map_err(|e| JudgeParseError::InvalidJson(e.to_string()))?;

    let score = val
        .get("score")
        .and_then(score_from_json)
        .ok_or(JudgeParseError::MissingScore)?;
    let reason = val
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    Ok((score, reason))
}

fn score_from_json(v: &serde_json::Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return (f.fract() == 0.0).then_some(f as i64);
    }
    v.as_str().and_then(|s| s.trim().parse().ok())
}

fn parse_lines(text: &str) -> Option<(i64, String)> {
    let mut score = None;
    let mut reason = String::new();
    for line in text.lines() {
        let line = line.trim().trim_start_matches(['*', '-', '#']).trim();
        if let Some(rest) = strip_label(line, "score") {
            if score.is_none() {
                score = leading_int(rest);
            }
        } else if let Some(rest) = strip_label(line, "reason") {
            if reason.is_empty() {
                reason = rest.trim().to_string();
            }
        }
    }
    score.map(|s| (s, reason))
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    line[label.len()..].trim_start().strip_prefix(':')
}

/// `85`, `85/100` and `85.` all yield 85.
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim().trim_start_matches('*').trim();
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
