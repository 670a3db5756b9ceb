//! Ownership hand-offs across the engine/runtime boundary.
//!
//! Both directions use leaked heap allocations addressed by `u64`: argument
//! payloads too large to inline travel client-to-runtime as a leaked
//! `Vec<Vec<u8>>`, and decoded replies travel runtime-to-client as a leaked
//! [`Value`]. Whoever takes the pointer owns the allocation and must consume
//! it exactly once.

use crate::value::Value;

/// Transfer an argument byte-vector list to the runtime.
///
/// The returned address stands in for the payload in the wire message; the
/// caller must not touch the vectors afterwards. The runtime reclaims the
/// allocation with [`take_leaked_bytes_vec`] when it processes the request —
/// a request built around this pointer and then never sent is a leak.
pub fn create_leaked_bytes_vec(args: Vec<Vec<u8>>) -> u64 {
    Box::into_raw(Box::new(args)) as u64
}

/// Reclaim an argument list leaked by [`create_leaked_bytes_vec`].
///
/// # Safety
///
/// `ptr` must come from [`create_leaked_bytes_vec`] and must not have been
/// taken before.
pub unsafe fn take_leaked_bytes_vec(ptr: u64) -> Vec<Vec<u8>> {
    *unsafe { Box::from_raw(ptr as *mut Vec<Vec<u8>>) }
}

/// Leak a decoded reply, producing the `resp_pointer` carried by a response
/// frame. Counterpart of [`value_from_pointer`].
pub fn value_to_pointer(value: Value) -> u64 {
    Box::into_raw(Box::new(value)) as u64
}

/// Decode a reply handle into its native [`Value`], consuming the handle.
///
/// # Safety
///
/// `ptr` must come from [`value_to_pointer`] and must not have been consumed
/// before.
pub unsafe fn value_from_pointer(ptr: u64) -> Value {
    *unsafe { Box::from_raw(ptr as *mut Value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_vec_roundtrip() {
        let args = vec![b"key".to_vec(), vec![0u8; 1024]];
        let ptr = create_leaked_bytes_vec(args.clone());
        assert_ne!(ptr, 0);
        let taken = unsafe { take_leaked_bytes_vec(ptr) };
        assert_eq!(taken, args);
    }

    #[test]
    fn value_roundtrip() {
        let value = Value::Array(vec![
            Value::Okay,
            Value::Int(2),
            Value::BulkString(b"2".to_vec()),
        ]);
        let ptr = value_to_pointer(value.clone());
        let decoded = unsafe { value_from_pointer(ptr) };
        assert_eq!(decoded, value);
    }

    #[test]
    fn pointers_are_distinct_per_allocation() {
        let a = value_to_pointer(Value::Nil);
        let b = value_to_pointer(Value::Nil);
        assert_ne!(a, b);
        unsafe {
            value_from_pointer(a);
            value_from_pointer(b);
        }
    }
}
