//! Value Objects
//!
//! 不変で、値そのものが等価性を決めるドメインの値。
//! 生成時にバリデーションを行い、不正な値が内部に入り込まないようにします。

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use super::error::ValueObjectError;

/// Characters a join code is built from (no 0/O/1/I to stay human-typeable).
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Characters before the dash in a normalized join code.
pub const JOIN_CODE_PREFIX_LEN: usize = 4;

/// Characters after the dash in a normalized join code.
pub const JOIN_CODE_SUFFIX_LEN: usize = 3;

/// Lockout bucket shared by every caller without a usable identity.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// 既存の ID 文字列から SessionId を作成
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValueObjectError::SessionIdEmpty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SessionId の生成器（UUID v4）
pub struct SessionIdFactory;

impl SessionIdFactory {
    pub fn generate() -> SessionId {
        SessionId(uuid::Uuid::new_v4().to_string())
    }
}

/// Normalized join code in `XXXX-XXX` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JoinCode(String);

impl JoinCode {
    /// Parse user input into a normalized join code.
    ///
    /// Input is trimmed and uppercased; spaces and dashes are ignored, so
    /// `"abcd efg"`, `"ABCD-EFG"` and `"abcdefg"` all normalize to `ABCD-EFG`.
    pub fn parse(input: &str) -> Result<Self, ValueObjectError> {
        let compact: Vec<u8> = input
            .trim()
            .bytes()
            .filter(|b| *b != b'-' && !b.is_ascii_whitespace())
            .map(|b| b.to_ascii_uppercase())
            .collect();

        if compact.len() != JOIN_CODE_PREFIX_LEN + JOIN_CODE_SUFFIX_LEN
            || !compact.iter().all(|b| JOIN_CODE_ALPHABET.contains(b))
        {
            return Err(ValueObjectError::InvalidJoinCodeFormat);
        }

        Ok(Self::from_compact(&compact))
    }

    /// Build a code from exactly seven alphabet characters.
    pub(crate) fn from_compact(compact: &[u8]) -> Self {
        let (prefix, suffix) = compact.split_at(JOIN_CODE_PREFIX_LEN.min(compact.len()));
        Self(format!(
            "{}-{}",
            String::from_utf8_lossy(prefix),
            String::from_utf8_lossy(suffix)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JoinCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unix timestamp in milliseconds (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// この時刻に `duration` を加えた時刻
    pub fn plus(&self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration_millis(duration)))
    }

    /// `earlier` からの経過ミリ秒（負にはならない）
    pub fn millis_since(&self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0).max(0)
    }
}

/// Duration をミリ秒の i64 に変換（桁あふれは飽和）
pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Remaining wait rounded up to whole seconds, never below one.
pub fn retry_after_secs(remaining_millis: i64) -> u64 {
    let millis = u64::try_from(remaining_millis.max(1)).unwrap_or(1);
    millis.div_ceil(1000).max(1)
}

/// Key of a guest row within a session: the trimmed, lowercased user id.
///
/// Rows and lockout bookkeeping share this form, so `Alice` and `alice` are
/// one guest.
pub fn guest_row_key(user_id: &str) -> String {
    user_id.trim().to_lowercase()
}

/// Normalize a guest user id into the key used for lockout bookkeeping.
///
/// Anonymous callers collapse into [`ANONYMOUS_IDENTITY`].
pub fn normalize_identity(user_id: &str) -> String {
    if is_anonymous_identity(user_id) {
        return ANONYMOUS_IDENTITY.to_string();
    }
    guest_row_key(user_id)
}

/// Whether a user id looks like an unauthenticated guest.
pub fn is_anonymous_identity(user_id: &str) -> bool {
    let normalized = user_id.trim().to_lowercase();
    normalized.is_empty() || normalized == ANONYMOUS_IDENTITY || normalized.starts_with("anon-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_code_parse_normalizes_case_and_separators() {
        // テスト項目: 大文字小文字・空白・ダッシュの違いが正規化される
        // given (前提条件):
        let inputs = ["abcd-efg", " ABCD EFG ", "abcdefg", "AB-CD-EFG"];

        // when (操作):
        let parsed: Vec<JoinCode> = inputs
            .iter()
            .map(|input| JoinCode::parse(input).unwrap())
            .collect();

        // then (期待する結果):
        for code in parsed {
            assert_eq!(code.as_str(), "ABCD-EFG");
        }
    }

    #[test]
    fn test_join_code_parse_rejects_malformed_input() {
        // テスト項目: 形式が不正なコードはエラーになる
        // given (前提条件):
        let inputs = ["12345", "", "ABCD-EF", "ABCD-EFGH", "ABCD-EF0", "OOOO-III"];

        // when (操作) / then (期待する結果):
        for input in inputs {
            assert_eq!(
                JoinCode::parse(input),
                Err(ValueObjectError::InvalidJoinCodeFormat),
                "input {input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_session_id_rejects_blank() {
        // テスト項目: 空白のみの SessionId は作成できない
        // when (操作):
        let result = SessionId::new("   ".to_string());

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::SessionIdEmpty));
    }

    #[test]
    fn test_session_id_factory_generates_unique_ids() {
        // テスト項目: 生成される SessionId は一意
        // when (操作):
        let first = SessionIdFactory::generate();
        let second = SessionIdFactory::generate();

        // then (期待する結果):
        assert_ne!(first, second);
    }

    #[test]
    fn test_timestamp_arithmetic() {
        // テスト項目: Timestamp の加算と経過時間の計算
        // given (前提条件):
        let start = Timestamp::new(10_000);

        // when (操作):
        let later = start.plus(Duration::from_secs(30));

        // then (期待する結果):
        assert_eq!(later.value(), 40_000);
        assert_eq!(later.millis_since(start), 30_000);
        assert_eq!(start.millis_since(later), 0);
    }

    #[test]
    fn test_retry_after_secs_rounds_up() {
        // テスト項目: 残り時間は秒単位に切り上げられ、最低 1 秒
        // then (期待する結果):
        assert_eq!(retry_after_secs(120_000), 120);
        assert_eq!(retry_after_secs(119_001), 120);
        assert_eq!(retry_after_secs(1), 1);
        assert_eq!(retry_after_secs(0), 1);
    }

    #[test]
    fn test_identity_normalization() {
        // テスト項目: ゲスト ID の正規化と匿名判定
        // then (期待する結果):
        assert_eq!(normalize_identity("  Alice "), "alice");
        assert_eq!(guest_row_key(" Alice "), normalize_identity("alice"));
        assert_eq!(normalize_identity(""), ANONYMOUS_IDENTITY);
        assert_eq!(normalize_identity("anon-42"), ANONYMOUS_IDENTITY);
        assert!(is_anonymous_identity("Anonymous"));
        assert!(!is_anonymous_identity("annie"));
    }
}
