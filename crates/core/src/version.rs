//! Package version ordering compatible with pacman's `vercmp`.
//!
//! Versions have the shape `[epoch:]version[-release]`. Epochs compare first,
//! then versions, then releases (only when both sides carry one). Each
//! component is compared segment by segment: runs of digits numerically, runs
//! of letters lexically, with numeric segments newer than alphabetic ones.

use std::cmp::Ordering;

/// Compare two full package versions.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (epoch_a, ver_a, rel_a) = split_evr(a);
    let (epoch_b, ver_b, rel_b) = split_evr(b);

    segment_cmp(epoch_a, epoch_b)
        .then_with(|| segment_cmp(ver_a, ver_b))
        .then_with(|| match (rel_a, rel_b) {
            (Some(ra), Some(rb)) => segment_cmp(ra, rb),
            _ => Ordering::Equal,
        })
}

/// Split into (epoch, version, release). A missing or empty epoch is "0".
fn split_evr(evr: &str) -> (&str, &str, Option<&str>) {
    let digits = evr.bytes().take_while(u8::is_ascii_digit).count();
    let (epoch, rest) = if evr.as_bytes().get(digits) == Some(&b':') {
        let epoch = &evr[..digits];
        (if epoch.is_empty() { "0" } else { epoch }, &evr[digits + 1..])
    } else {
        ("0", evr)
    };

    match rest.rfind('-') {
        Some(idx) => (epoch, &rest[..idx], Some(&rest[idx + 1..])),
        None => (epoch, rest, None),
    }
}

/// Segment-wise comparison of a single version component.
fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut one, mut two) = (0usize, 0usize);

    while one < a.len() && two < b.len() {
        let sep_start_a = one;
        let sep_start_b = two;
        while one < a.len() && !a[one].is_ascii_alphanumeric() {
            one += 1;
        }
        while two < b.len() && !b[two].is_ascii_alphanumeric() {
            two += 1;
        }

        if one >= a.len() || two >= b.len() {
            break;
        }

        // A longer separator run wins.
        let (sep_a, sep_b) = (one - sep_start_a, two - sep_start_b);
        if sep_a != sep_b {
            return sep_a.cmp(&sep_b);
        }

        let is_num = a[one].is_ascii_digit();
        let end_a = segment_end(a, one, is_num);
        let end_b = segment_end(b, two, is_num);

        if end_b == two {
            // Numeric segments are newer than alphabetic ones.
            return if is_num {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg_a = &a[one..end_a];
        let mut seg_b = &b[two..end_b];
        if is_num {
            seg_a = trim_leading_zeros(seg_a);
            seg_b = trim_leading_zeros(seg_b);
            match seg_a.len().cmp(&seg_b.len()) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        match seg_a.cmp(seg_b) {
            Ordering::Equal => {}
            other => return other,
        }

        one = end_a;
        two = end_b;
    }

    let rest_a = &a[one.min(a.len())..];
    let rest_b = &b[two.min(b.len())..];
    if rest_a.is_empty() && rest_b.is_empty() {
        return Ordering::Equal;
    }

    // Whichever side still has an alphabetic tail is older ("1.0a" < "1.0").
    let a_alpha = rest_a.first().is_some_and(u8::is_ascii_alphabetic);
    let b_alpha = rest_b.first().is_some_and(u8::is_ascii_alphabetic);
    if (rest_a.is_empty() && !b_alpha) || a_alpha {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn segment_end(s: &[u8], start: usize, numeric: bool) -> usize {
    let mut end = start;
    while end < s.len()
        && if numeric {
            s[end].is_ascii_digit()
        } else {
            s[end].is_ascii_alphabetic()
        }
    {
        end += 1;
    }
    end
}

fn trim_leading_zeros(s: &[u8]) -> &[u8] {
    let zeros = s.iter().take_while(|&&c| c == b'0').count();
    &s[zeros..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_older(a: &str, b: &str) {
        assert_eq!(vercmp(a, b), Ordering::Less, "{a} should be older than {b}");
        assert_eq!(vercmp(b, a), Ordering::Greater, "{b} should be newer than {a}");
    }

    #[test]
    fn test_equal_versions() {
        assert_eq!(vercmp("1.0-1", "1.0-1"), Ordering::Equal);
        assert_eq!(vercmp("1.0", "1.0-5"), Ordering::Equal);
        assert_eq!(vercmp("0:1.0", "1.0"), Ordering::Equal);
        assert_eq!(vercmp("1.001", "1.1"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_segments() {
        assert_older("1.0", "1.1");
        assert_older("1.9", "1.10");
        assert_older("1.0", "1.0.1");
        assert_older("1.0-1", "1.0-2");
    }

    #[test]
    fn test_alpha_segments() {
        assert_older("1.0a", "1.0");
        assert_older("1.0alpha", "1.0beta");
        assert_older("1.0a", "1.0.1");
        assert_older("1.a", "1.1");
    }

    #[test]
    fn test_epoch_dominates() {
        assert_older("2.0", "1:1.0");
        assert_older("1:2.0", "2:1.0");
    }

    #[test]
    fn test_separator_length() {
        assert_older("1.0", "1..0");
    }
}
