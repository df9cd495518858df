//! RTMP timestamps are 32 bit unsigned millisecond counts from an unknown epoch.
//!
//! Streams can outlive the 49.7 days a `u32` holds, so timestamps wrap.  Arithmetic on
//! `RtmpTimestamp` wraps as well, and two timestamps are compared by assuming they are within
//! 2<sup>31</sup> - 1 milliseconds of each other, the window the RTMP specification calls
//! adjacent.
//!
//! # Examples
//!
//! ```
//! use rml_rtmp::time::RtmpTimestamp;
//!
//! let start = RtmpTimestamp::new(4_294_967_000);
//! let later = start + 1000;
//!
//! assert_eq!(later, 704);
//! assert!(later > start);
//! assert_eq!((later - start).value, 1000);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// The representation of a RTMP timestamp
#[derive(Eq, PartialEq, Debug, Copy, Clone, Default, Hash)]
pub struct RtmpTimestamp {
    /// The time (as milliseconds from an unknown epoch) being represented by the timestamp
    pub value: u32,
}

impl RtmpTimestamp {
    pub fn new(initial_value: u32) -> Self {
        RtmpTimestamp {
            value: initial_value,
        }
    }

    pub fn set(&mut self, new_value: u32) {
        self.value = new_value;
    }
}

impl fmt::Display for RtmpTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}ms", self.value)
    }
}

macro_rules! wrapping_operator {
    ($operator:ident, $method:ident, $wrapping:ident) => {
        impl $operator for RtmpTimestamp {
            type Output = RtmpTimestamp;

            fn $method(self, other: RtmpTimestamp) -> RtmpTimestamp {
                RtmpTimestamp::new(self.value.$wrapping(other.value))
            }
        }

        impl $operator<u32> for RtmpTimestamp {
            type Output = RtmpTimestamp;

            fn $method(self, other: u32) -> RtmpTimestamp {
                RtmpTimestamp::new(self.value.$wrapping(other))
            }
        }
    };
}

wrapping_operator!(Add, add, wrapping_add);
wrapping_operator!(Sub, sub, wrapping_sub);

/// Orders two values that are assumed to be adjacent, so a small value that just wrapped is
/// later than a value near `u32::MAX`
fn compare(left: u32, right: u32) -> Ordering {
    match left.wrapping_sub(right) as i32 {
        0 => Ordering::Equal,
        x if x > 0 => Ordering::Greater,
        _ => Ordering::Less,
    }
}

impl Ord for RtmpTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self.value, other.value)
    }
}

impl PartialOrd for RtmpTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq<u32> for RtmpTimestamp {
    fn eq(&self, other: &u32) -> bool {
        self.value == *other
    }
}

impl PartialEq<RtmpTimestamp> for u32 {
    fn eq(&self, other: &RtmpTimestamp) -> bool {
        *self == other.value
    }
}

impl PartialOrd<u32> for RtmpTimestamp {
    fn partial_cmp(&self, other: &u32) -> Option<Ordering> {
        Some(compare(self.value, *other))
    }
}

impl PartialOrd<RtmpTimestamp> for u32 {
    fn partial_cmp(&self, other: &RtmpTimestamp) -> Option<Ordering> {
        Some(compare(*self, other.value))
    }
}

#[cfg(test)]
mod tests {
    use super::RtmpTimestamp;

    #[test]
    fn addition_wraps() {
        assert_eq!(RtmpTimestamp::new(50) + RtmpTimestamp::new(60), 110);
        assert_eq!(RtmpTimestamp::new(u32::max_value()) + 60, 59);
        assert_eq!(RtmpTimestamp::new(u32::max_value()) + RtmpTimestamp::new(60), 59);
    }

    #[test]
    fn subtraction_wraps() {
        assert_eq!(RtmpTimestamp::new(60) - 50, 10);
        assert_eq!(RtmpTimestamp::new(0) - RtmpTimestamp::new(50), u32::max_value() - 49);
    }

    #[test]
    fn adjacent_values_compare_normally() {
        let earlier = RtmpTimestamp::new(50);
        let later = RtmpTimestamp::new(60);

        assert!(earlier < later);
        assert!(later > earlier);
        assert!(earlier < 60);
        assert!(70 > earlier);
        assert_eq!(earlier.max(later), later);
    }

    #[test]
    fn wrapped_values_are_later() {
        let wrapped = RtmpTimestamp::new(10000);
        let before_wrap = RtmpTimestamp::new(4_000_000_000);
        let much_earlier = RtmpTimestamp::new(3_000_000_000);

        assert!(wrapped > before_wrap);
        assert!(much_earlier < before_wrap);
    }

    #[test]
    fn timestamps_display_as_milliseconds() {
        let mut time = RtmpTimestamp::new(50);
        time.set(1500);
        assert_eq!(time.to_string(), "1500ms");
    }
}
