//! 代际 handle
//!
//! handle 是 32-bit 的打包值：低 k 位是 slot 下标，高 (32-k) 位是代际计数。
//! handle 本身不拥有资源，可以随意复制、比较；真正的有效性检查在
//! [`crate::handle_pool::HandlePool`] 里完成。

use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// 每个 pool 默认的下标位宽（剩余 8 位留给代际）
pub const DEFAULT_INDEX_BITS: u32 = 24;

/// 未参数化的 32-bit handle
///
/// 原始值是 `((generation << index_bits) | index) + 1`：偏移 1 之后，
/// 全零就是保留的 null 值，而第一个 slot 的第一次分配仍然观察到
/// `{index: 0, generation: 0}`。
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct RawHandle(u32);

impl RawHandle {
    pub const NULL: Self = Self(0);

    #[inline]
    pub fn from_parts(index: u32, generation: u32, index_bits: u32) -> Self {
        debug_assert!(index < (1u32 << index_bits));
        debug_assert!(generation <= (u32::MAX >> index_bits));
        Self(((generation << index_bits) | index).wrapping_add(1))
    }

    #[inline]
    pub fn index(self, index_bits: u32) -> u32 {
        self.0.wrapping_sub(1) & ((1u32 << index_bits) - 1)
    }

    #[inline]
    pub fn generation(self, index_bits: u32) -> u32 {
        self.0.wrapping_sub(1) >> index_bits
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl Debug for RawHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "RawHandle(NULL)")
        } else {
            write!(f, "RawHandle({:#010x})", self.0)
        }
    }
}

/// 按资源类型参数化的 handle
///
/// 类型参数只存在于编译期，保证 buffer 的 handle 不可能拿去查 texture
/// 的 pool。`Default` 是 null handle。
pub struct Handle<T> {
    raw: RawHandle,
    _marker: PhantomData<T>,
}

impl<T> Handle<T> {
    pub const NULL: Self = Self {
        raw: RawHandle::NULL,
        _marker: PhantomData,
    };

    #[inline]
    pub fn from_raw(raw: RawHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn raw(self) -> RawHandle {
        self.raw
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.raw.is_null()
    }
}

// 手写这些 impl：derive 会给 T 加上不必要的约束
impl<T> Copy for Handle<T> {}
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<T> Eq for Handle<T> {}
impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}
impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NULL
    }
}
impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>({:?})", std::any::type_name::<T>(), self.raw)
    }
}
