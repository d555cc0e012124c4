/// Upper bound for the automatic thread count.
const MAX_DEFAULT_THREADS: usize = 4;

/// Thread count handed to the backend; negative means `min(cpus, 4)`.
/// Resolved on every call so the host can change it between calls.
pub fn resolve_threads(threads: i32) -> usize {
    match usize::try_from(threads) {
        Ok(n) => n,
        Err(_) => num_cpus::get().min(MAX_DEFAULT_THREADS),
    }
}

/// Length of the longest prefix of `bytes` that is valid UTF-8.
pub(super) fn utf8_valid_prefix_len(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        Err(e) => e.valid_up_to(),
    }
}

/// Move every complete character from `staging` into `out`.
///
/// Invalid sequences become U+FFFD; an incomplete trailing sequence stays
/// staged until the next piece arrives.
pub(super) fn drain_utf8(staging: &mut Vec<u8>, out: &mut String) {
    loop {
        let valid = utf8_valid_prefix_len(staging);
        out.push_str(&String::from_utf8_lossy(&staging[..valid]));
        staging.drain(..valid);

        let invalid = match std::str::from_utf8(staging) {
            Ok(_) => None,
            Err(e) => e.error_len(),
        };
        match invalid {
            Some(n) => {
                out.push(char::REPLACEMENT_CHARACTER);
                staging.drain(..n);
            }
            None => return,
        }
    }
}
