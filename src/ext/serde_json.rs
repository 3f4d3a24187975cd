// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Dotted-path lookups and JavaScript-style truthiness over serde_json::Value for loosely shaped payloads
// role: extension/serde_json
// outputs: JsonFetch trait and JsonFetched wrapper; is_truthy helper
// invariants: No panics; missing paths yield None; text() only yields non-empty strings
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use serde::de::DeserializeOwned;
use serde_json::Value;

/// A possibly-missing location inside a JSON document.
pub struct JsonFetched<'a> {
  inner: Option<&'a Value>,
}

impl<'a> JsonFetched<'a> {
  pub fn value(&self) -> Option<&'a Value> {
    self.inner
  }

  /// Attempt to deserialize the fetched value as `T`.
  pub fn to<T>(&self) -> Option<T>
  where
    T: DeserializeOwned,
  {
    self.inner.and_then(|v| serde_json::from_value::<T>(v.clone()).ok())
  }

  /// A non-empty string at this location, if any.
  pub fn text(&self) -> Option<&'a str> {
    self.inner.and_then(Value::as_str).filter(|s| !s.is_empty())
  }

  pub fn is_truthy(&self) -> bool {
    self.inner.map(is_truthy).unwrap_or(false)
  }
}

/// Fetch nested values via dotted paths like `body.message`.
pub trait JsonFetch {
  fn fetch(&self, path: &str) -> JsonFetched<'_>;
}

impl JsonFetch for Value {
  fn fetch(&self, path: &str) -> JsonFetched<'_> {
    if path.is_empty() {
      return JsonFetched { inner: Some(self) };
    }

    let mut cur = self;

    for key in path.split('.') {
      match cur.get(key) {
        Some(next) => cur = next,
        None => return JsonFetched { inner: None },
      }
    }

    JsonFetched { inner: Some(cur) }
  }
}

/// Truthiness as a browser would judge a configuration value.
pub fn is_truthy(v: &Value) -> bool {
  match v {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}
