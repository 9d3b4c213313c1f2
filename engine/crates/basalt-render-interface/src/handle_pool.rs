//! 单一资源种类的 slot pool

use std::collections::VecDeque;

use crate::handles::{DEFAULT_INDEX_BITS, Handle, RawHandle};

struct Slot<T> {
    /// Some 即 live；释放后变回 None
    payload: Option<T>,
    generation: u32,
}

/// 代际 slot pool
///
/// 所有 slot 的 payload 内存都归 pool 所有，handle 只是带校验的下标。
/// 单写者设计：pool 内部没有任何锁，多线程分配需要调用方自己串行化。
///
/// # Destroy
/// drop 时 pool 必须已经为空，否则视为资源泄漏。
pub struct HandlePool<T> {
    name: &'static str,
    slots: Vec<Slot<T>>,
    /// FIFO，让下标按释放顺序复用
    free_queue: VecDeque<u32>,
    /// 固定 pool 的容量，也是可增长 pool 每次扩容的块大小
    block_capacity: u32,
    growable: bool,
    index_bits: u32,
    live_count: u32,
}

// new & init
impl<T> HandlePool<T> {
    pub fn new(name: &'static str, capacity: u32, growable: bool) -> Self {
        Self::with_index_bits(name, capacity, growable, DEFAULT_INDEX_BITS)
    }

    pub fn with_index_bits(name: &'static str, capacity: u32, growable: bool, index_bits: u32) -> Self {
        assert!(capacity > 0, "pool `{name}`: capacity must be non-zero");
        assert!(index_bits < 32, "pool `{name}`: index_bits must leave room for a generation");
        assert!(
            (capacity as u64) <= (1u64 << index_bits),
            "pool `{name}`: capacity {capacity} does not fit in {index_bits} index bits"
        );

        let mut pool = Self {
            name,
            slots: Vec::with_capacity(capacity as usize),
            free_queue: VecDeque::with_capacity(capacity as usize),
            block_capacity: capacity,
            growable,
            index_bits,
            live_count: 0,
        };
        pool.add_block();
        pool
    }

    /// 追加一块 block_capacity 大小的 slot 区间
    ///
    /// handle 是下标而不是指针，Vec 扩容搬动 slot 不会使已有 handle 失效。
    fn add_block(&mut self) -> bool {
        let old_len = self.slots.len() as u64;
        let new_len = old_len + self.block_capacity as u64;
        if new_len > (1u64 << self.index_bits) {
            log::error!("pool `{}`: cannot grow past {} slots ({} index bits)", self.name, old_len, self.index_bits);
            return false;
        }

        for index in old_len as u32..new_len as u32 {
            self.slots.push(Slot {
                payload: None,
                generation: 0,
            });
            self.free_queue.push_back(index);
        }
        true
    }
}

// alloc & release
impl<T> HandlePool<T> {
    /// 分配一个 slot，返回它的 handle
    ///
    /// 固定容量的 pool 用尽时返回 null handle，调用方需要检查。
    /// payload 需要显式销毁（而不能随手丢弃）时用 [`HandlePool::try_alloc`]。
    pub fn alloc(&mut self, payload: T) -> Handle<T> {
        self.try_alloc(payload).unwrap_or(Handle::NULL)
    }

    /// alloc 的可恢复版本：pool 用尽时原样退回 payload
    pub fn try_alloc(&mut self, payload: T) -> Result<Handle<T>, T> {
        if self.free_queue.is_empty() {
            let grown = self.growable && self.add_block();
            if !grown {
                log::warn!("pool `{}` exhausted ({} slots)", self.name, self.slots.len());
                return Err(payload);
            }
        }

        let index = self.free_queue.pop_front().unwrap();
        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.payload.is_none());
        slot.payload = Some(payload);
        self.live_count += 1;

        Ok(Handle::from_raw(RawHandle::from_parts(index, slot.generation, self.index_bits)))
    }

    /// 释放 handle 指向的 slot，返回它的 payload
    ///
    /// 无效（过期/null/已释放）的 handle 是 no-op，返回 None。
    /// 代际在释放时自增一次，并在代际位宽内回绕；经过 2^(32-k) 次复用后
    /// 过期 handle 可能与新 handle 撞值，这是已接受的风险，pool 不做防护。
    pub fn release(&mut self, handle: Handle<T>) -> Option<T> {
        if !self.is_valid(handle) {
            return None;
        }

        let index = handle.raw().index(self.index_bits);
        let gen_mask = u32::MAX >> self.index_bits;
        let slot = &mut self.slots[index as usize];
        let payload = slot.payload.take();
        slot.generation = (slot.generation + 1) & gen_mask;
        self.free_queue.push_back(index);
        self.live_count -= 1;
        payload
    }
}

// 校验与解引用
impl<T> HandlePool<T> {
    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        if handle.is_null() {
            return false;
        }
        let index = handle.raw().index(self.index_bits) as usize;
        if index >= self.slots.len() {
            return false;
        }
        let slot = &self.slots[index];
        slot.generation == handle.raw().generation(self.index_bits) && slot.payload.is_some()
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if !self.is_valid(handle) {
            return None;
        }
        self.slots[handle.raw().index(self.index_bits) as usize].payload.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if !self.is_valid(handle) {
            return None;
        }
        self.slots[handle.raw().index(self.index_bits) as usize].payload.as_mut()
    }

    /// get 的致命版本：无效 handle 直接 panic
    ///
    /// 过期 handle 属于调用方 bug，不是运行时可恢复的状况。
    pub fn resolve(&self, handle: Handle<T>) -> &T {
        self.get(handle).unwrap_or_else(|| panic!("stale or null handle resolved against pool `{}`", self.name))
    }

    pub fn resolve_mut(&mut self, handle: Handle<T>) -> &mut T {
        let name = self.name;
        self.get_mut(handle).unwrap_or_else(|| panic!("stale or null handle resolved against pool `{name}`"))
    }
}

// getters
impl<T> HandlePool<T> {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn index_of(&self, handle: Handle<T>) -> u32 {
        handle.raw().index(self.index_bits)
    }

    #[inline]
    pub fn generation_of(&self, handle: Handle<T>) -> u32 {
        handle.raw().generation(self.index_bits)
    }

    #[inline]
    pub fn live_count(&self) -> u32 {
        self.live_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }
}

impl<T> Drop for HandlePool<T> {
    fn drop(&mut self) {
        if self.live_count != 0 {
            log::error!("pool `{}` dropped with {} live handles", self.name, self.live_count);
        }
        debug_assert!(self.live_count == 0, "pool `{}` dropped with live handles", self.name);
    }
}
