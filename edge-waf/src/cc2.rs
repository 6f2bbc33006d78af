//! CC2 rate-limit counter (spec.md §4.G), grounded on the `CC2Checkpoint`
//! WAF checkpoint: composite-key derivation plus a fingerprint-augmented
//! parallel counter, both driven through [`edge_ttlcache::Cache`].

use edge_common::config::Cc2Settings;
use edge_common::date::now_unix;
use edge_ttlcache::Cache;

const COMMON_FILE_EXTENSIONS: &[&str] =
    &["ico", "jpg", "jpeg", "gif", "png", "webp", "woff2", "js", "css"];

const REMOTE_ADDR_PLACEHOLDERS: [&str; 2] = ["${remoteAddr}", "${rawRemoteAddr}"];

/// Request facts the counter needs, independent of how the request type is
/// parsed or represented (out of scope, spec.md §1).
pub trait Cc2Request {
    /// Expands a key template against the request's variables.
    fn format(&self, template: &str) -> String;
    /// Opaque client fingerprint used for the secondary counter.
    fn fingerprint(&self) -> &[u8];
    fn referer(&self) -> Option<&str>;
    fn path(&self) -> &str;
}

/// `cc2.{keys, period, threshold, ignore_common_files, enable_fingerprint}`
/// rule options (spec.md §4.G).
pub struct Cc2Options<'a> {
    pub keys: &'a [String],
    pub period_secs: i64,
    pub threshold: i64,
    pub ignore_common_files: bool,
    pub enable_fingerprint: bool,
}

impl<'a> Cc2Options<'a> {
    /// Builds options from ambient config, applying the `<= 0` fallbacks
    /// spec.md §4.G step 1 calls out (`period` default 60s, `threshold`
    /// default 1000) on top of whatever `settings` already carries.
    pub fn from_settings(keys: &'a [String], settings: &Cc2Settings) -> Self {
        Self {
            keys,
            period_secs: if settings.period_secs > 0 { settings.period_secs } else { 60 },
            threshold: if settings.threshold > 0 { settings.threshold } else { 1000 },
            ignore_common_files: settings.ignore_common_files,
            enable_fingerprint: settings.enable_fingerprint,
        }
    }
}

/// Result of one [`evaluate`] call. Whether `value >= threshold` triggers a
/// rule action is outside this component (spec.md §4.G step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cc2Outcome {
    pub value: i64,
    pub threshold: i64,
    /// True when the request was never counted (no keys, or a common-file
    /// extension with a `Referer` present while `ignore_common_files` is
    /// on).
    pub skipped: bool,
}

fn counter_key(rule_id: i64, resolved: &[String]) -> String {
    format!("WAF-CC-{rule_id}-{}", resolved.join("@"))
}

fn extension_of(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Derives the counter key(s) for `request` under `rule_id` and increments
/// them against `ttl`, returning the larger of the primary and (if
/// applicable) fingerprint-augmented counts.
pub fn evaluate(ttl: &Cache, request: &dyn Cc2Request, rule_id: i64, options: &Cc2Options) -> Cc2Outcome {
    if options.keys.is_empty() {
        return Cc2Outcome { value: 0, threshold: options.threshold, skipped: true };
    }

    let has_remote_addr = options.keys.iter().any(|key| REMOTE_ADDR_PLACEHOLDERS.contains(&key.as_str()));
    let resolved: Vec<String> = options.keys.iter().map(|key| request.format(key)).collect();

    if options.ignore_common_files {
        let referer_present = request.referer().is_some_and(|referer| !referer.is_empty());
        if referer_present {
            let ext = extension_of(request.path());
            if !ext.is_empty() && COMMON_FILE_EXTENSIONS.contains(&ext.as_str()) {
                return Cc2Outcome { value: 0, threshold: options.threshold, skipped: true };
            }
        }
    }

    let expires_at = now_unix() + options.period_secs;
    let primary_key = counter_key(rule_id, &resolved);
    let mut value = ttl.increase_int64(&primary_key, 1, expires_at, false);

    // Zero-length fingerprint means "skip", not "use an empty fingerprint"
    // (spec.md §9 open question).
    if has_remote_addr && options.enable_fingerprint {
        let fingerprint = request.fingerprint();
        if !fingerprint.is_empty() {
            let fp_hex = hex_encode(fingerprint);
            let fp_resolved: Vec<String> = options
                .keys
                .iter()
                .zip(resolved.iter())
                .map(|(key, value)| {
                    if REMOTE_ADDR_PLACEHOLDERS.contains(&key.as_str()) {
                        fp_hex.clone()
                    } else {
                        value.clone()
                    }
                })
                .collect();
            let fp_key = counter_key(rule_id, &fp_resolved);
            let fp_value = ttl.increase_int64(&fp_key, 1, expires_at, false);
            if fp_value > value {
                value = fp_value;
            }
        }
    }

    Cc2Outcome { value, threshold: options.threshold, skipped: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRequest {
        remote_addr: String,
        referer: Option<String>,
        path: String,
        fingerprint: Vec<u8>,
    }

    impl Cc2Request for FakeRequest {
        fn format(&self, template: &str) -> String {
            match template {
                "${remoteAddr}" => self.remote_addr.clone(),
                other => other.to_string(),
            }
        }
        fn fingerprint(&self) -> &[u8] {
            &self.fingerprint
        }
        fn referer(&self) -> Option<&str> {
            self.referer.as_deref()
        }
        fn path(&self) -> &str {
            &self.path
        }
    }

    fn request(remote_addr: &str) -> FakeRequest {
        FakeRequest { remote_addr: remote_addr.into(), referer: None, path: "/".into(), fingerprint: vec![] }
    }

    #[test]
    fn sequential_calls_increment_monotonically() {
        let ttl = Cache::with_pieces(4, 1024);
        let keys = vec!["${remoteAddr}".to_string()];
        let options = Cc2Options { keys: &keys, period_secs: 60, threshold: 1000, ignore_common_files: false, enable_fingerprint: false };
        let req = request("1.2.3.4");

        for expected in 1..=5 {
            let outcome = evaluate(&ttl, &req, 1, &options);
            assert_eq!(outcome.value, expected);
        }
    }

    #[test]
    fn distinct_keys_count_independently() {
        let ttl = Cache::with_pieces(4, 1024);
        let keys = vec!["${remoteAddr}".to_string()];
        let options = Cc2Options { keys: &keys, period_secs: 60, threshold: 1000, ignore_common_files: false, enable_fingerprint: false };

        evaluate(&ttl, &request("1.1.1.1"), 1, &options);
        let outcome = evaluate(&ttl, &request("2.2.2.2"), 1, &options);
        assert_eq!(outcome.value, 1);
    }

    #[test]
    fn ignores_common_files_when_referer_present() {
        let ttl = Cache::with_pieces(4, 1024);
        let keys = vec!["${remoteAddr}".to_string()];
        let options = Cc2Options { keys: &keys, period_secs: 60, threshold: 1000, ignore_common_files: true, enable_fingerprint: false };
        let mut req = request("1.2.3.4");
        req.referer = Some("https://example.com/".into());
        req.path = "/assets/logo.PNG".into();

        let outcome = evaluate(&ttl, &req, 1, &options);
        assert!(outcome.skipped);
        assert_eq!(outcome.value, 0);
    }

    #[test]
    fn does_not_ignore_common_files_without_referer() {
        let ttl = Cache::with_pieces(4, 1024);
        let keys = vec!["${remoteAddr}".to_string()];
        let options = Cc2Options { keys: &keys, period_secs: 60, threshold: 1000, ignore_common_files: true, enable_fingerprint: false };
        let mut req = request("1.2.3.4");
        req.path = "/assets/logo.png".into();

        let outcome = evaluate(&ttl, &req, 1, &options);
        assert!(!outcome.skipped);
        assert_eq!(outcome.value, 1);
    }

    #[test]
    fn fingerprint_counter_can_exceed_primary_when_remote_addr_is_shared() {
        let ttl = Cache::with_pieces(4, 1024);
        let keys = vec!["${remoteAddr}".to_string(), "${host}".to_string()];
        let options = Cc2Options { keys: &keys, period_secs: 60, threshold: 1000, ignore_common_files: false, enable_fingerprint: true };

        let mut req_a = request("1.2.3.4");
        req_a.fingerprint = vec![0xAA];
        let mut req_b = request("1.2.3.4");
        req_b.fingerprint = vec![0xBB];

        // Two distinct fingerprints behind the same remote address: the
        // ${host} segment is identical ("${host}" unresolved by the fake),
        // so the primary key (keyed only on remoteAddr+host) is shared and
        // climbs faster than either fingerprint-keyed counter alone.
        evaluate(&ttl, &req_a, 1, &options);
        let outcome = evaluate(&ttl, &req_b, 1, &options);
        assert_eq!(outcome.value, 2);
    }

    #[test]
    fn empty_keys_are_skipped() {
        let ttl = Cache::with_pieces(4, 1024);
        let keys: Vec<String> = vec![];
        let options = Cc2Options { keys: &keys, period_secs: 60, threshold: 1000, ignore_common_files: false, enable_fingerprint: false };
        let outcome = evaluate(&ttl, &request("1.2.3.4"), 1, &options);
        assert!(outcome.skipped);
    }

    #[test]
    fn zero_length_fingerprint_is_treated_as_skip_not_empty_string() {
        let ttl = Cache::with_pieces(4, 1024);
        let keys = vec!["${remoteAddr}".to_string()];
        let options = Cc2Options { keys: &keys, period_secs: 60, threshold: 1000, ignore_common_files: false, enable_fingerprint: true };
        let req = request("1.2.3.4");

        let outcome = evaluate(&ttl, &req, 1, &options);
        // With no fingerprint, only the primary counter advances; a second
        // call from the same address keeps climbing by 1 each time rather
        // than being doubled by a phantom fingerprint-keyed counter.
        let outcome2 = evaluate(&ttl, &req, 1, &options);
        assert_eq!(outcome.value, 1);
        assert_eq!(outcome2.value, 2);
    }
}
