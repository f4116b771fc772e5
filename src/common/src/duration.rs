// Copyright 2024 Tideflow Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Human duration parsing: `"10m"`, `"1h"`, `"24d"` → milliseconds.

use crate::error::{Error, Result};

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Parses a string of the form `<int><unit>` (unit one of `s`, `m`, `h`,
/// `d`, case-insensitive) into milliseconds.
///
/// The original token is kept by callers that need it (e.g. for the
/// `"{name}_{kind}_{window_str}"` emission key), so this function only
/// returns the millisecond value.
pub fn parse_duration_ms(token: &str) -> Result<i64> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::MalformedDuration(token.to_string()));
    }

    let split_at = token
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| Error::MalformedDuration(token.to_string()))?;
    let (digits, unit) = token.split_at(split_at);
    if digits.is_empty() || unit.is_empty() {
        return Err(Error::MalformedDuration(token.to_string()));
    }

    let n: i64 = digits
        .parse()
        .map_err(|_| Error::MalformedDuration(token.to_string()))?;

    let multiplier = match unit.to_ascii_lowercase().as_str() {
        "s" => MS_PER_SECOND,
        "m" => MS_PER_MINUTE,
        "h" => MS_PER_HOUR,
        "d" => MS_PER_DAY,
        _ => return Err(Error::MalformedDuration(token.to_string())),
    };

    Ok(n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration_ms("10m").unwrap(), 10 * 60_000);
        assert_eq!(parse_duration_ms("1h").unwrap(), 3_600_000);
        assert_eq!(parse_duration_ms("2D").unwrap(), 2 * 86_400_000);
        assert_eq!(parse_duration_ms("30s").unwrap(), 30_000);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_duration_ms("").is_err());
        assert!(parse_duration_ms("m").is_err());
        assert!(parse_duration_ms("10").is_err());
        assert!(parse_duration_ms("10x").is_err());
    }
}
