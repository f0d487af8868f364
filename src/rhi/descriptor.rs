//! 持久描述符分配器
//!
//! 管理 CPU 侧描述符堆池和空闲块列表，为资源视图分配持久的
//! 描述符槽位。
//!
//! # 设计
//!
//! - **懒增长堆池**：初始没有堆；分配失败时创建一个固定容量的新堆
//! - **空闲块列表**：每个堆维护按起始地址严格升序的 `FreeRange` 列表，
//!   释放时与相邻块双向合并，分配时从第一个块的头部切出
//! - **移动语义槽位**：[`DescriptorSlot`] 不可克隆，释放按值消耗，
//!   双重释放在类型层面不可表达；重叠释放触发断言

use std::sync::Arc;

use tracing::debug;

use crate::core::error::Result;
use super::device::{DescriptorHeap, DescriptorHeapDesc, HeapKind, RenderDevice};

/// 描述符句柄（CPU 可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuDescriptorHandle {
    /// 句柄指针值
    pub ptr: usize,
    /// 堆内描述符索引
    pub index: u32,
}

impl CpuDescriptorHandle {
    /// 创建新的 CPU 描述符句柄
    pub fn new(ptr: usize, index: u32) -> Self {
        Self { ptr, index }
    }

    /// 偏移句柄
    pub fn offset(&self, count: u32, increment_size: u32) -> Self {
        Self {
            ptr: self.ptr + (count * increment_size) as usize,
            index: self.index + count,
        }
    }
}

/// 描述符句柄（GPU 可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuDescriptorHandle {
    /// 句柄指针值
    pub ptr: u64,
    /// 堆内描述符索引
    pub index: u32,
}

impl GpuDescriptorHandle {
    /// 创建新的 GPU 描述符句柄
    pub fn new(ptr: u64, index: u32) -> Self {
        Self { ptr, index }
    }

    /// 偏移句柄
    pub fn offset(&self, count: u32, increment_size: u32) -> Self {
        Self {
            ptr: self.ptr + (count * increment_size) as u64,
            index: self.index + count,
        }
    }
}

/// 已分配的描述符槽位
///
/// 有意不实现 `Clone`/`Copy`：释放（[`DescriptorAllocator::free_slot`]）
/// 按值消耗槽位，同一槽位无法被释放两次。
#[derive(Debug)]
pub struct DescriptorSlot {
    cpu: CpuDescriptorHandle,
    heap_index: usize,
}

impl DescriptorSlot {
    /// 槽位的 CPU 句柄
    pub fn cpu(&self) -> CpuDescriptorHandle {
        self.cpu
    }

    /// 所属堆在池中的索引
    pub fn heap_index(&self) -> usize {
        self.heap_index
    }
}

/// 空闲块 `[start, end)`，单位为句柄指针值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FreeRange {
    start: usize,
    end: usize,
}

/// 堆池中的一项：堆加上它的空闲块列表
struct HeapEntry {
    heap: Box<dyn DescriptorHeap>,
    /// 按 `start` 严格升序，任意两块互不相邻（相邻即合并）
    free_ranges: Vec<FreeRange>,
}

impl HeapEntry {
    fn new(heap: Box<dyn DescriptorHeap>) -> Self {
        let start = heap.cpu_start().ptr;
        let end = start + (heap.capacity() * heap.increment_size()) as usize;
        Self {
            heap,
            free_ranges: vec![FreeRange { start, end }],
        }
    }

    /// 该堆是否还有空闲槽位
    fn has_free(&self) -> bool {
        !self.free_ranges.is_empty()
    }

    /// 从第一个空闲块的头部切出一个槽位
    fn take_front(&mut self) -> usize {
        let range = &mut self.free_ranges[0];
        let ptr = range.start;
        range.start += self.heap.increment_size() as usize;
        if range.start == range.end {
            self.free_ranges.remove(0);
        }
        ptr
    }

    /// 把 `[start, end)` 归还到空闲列表，与相邻块双向合并
    fn insert_range(&mut self, start: usize, end: usize) {
        let pos = self
            .free_ranges
            .partition_point(|r| r.start < start);

        // 与前驱/后继重叠说明调用方释放了未分配的区域
        if pos > 0 {
            assert!(
                self.free_ranges[pos - 1].end <= start,
                "freed descriptor range overlaps an existing free range"
            );
        }
        if pos < self.free_ranges.len() {
            assert!(
                end <= self.free_ranges[pos].start,
                "freed descriptor range overlaps an existing free range"
            );
        }

        let merge_prev = pos > 0 && self.free_ranges[pos - 1].end == start;
        let merge_next = pos < self.free_ranges.len() && self.free_ranges[pos].start == end;

        match (merge_prev, merge_next) {
            (true, true) => {
                self.free_ranges[pos - 1].end = self.free_ranges[pos].end;
                self.free_ranges.remove(pos);
            }
            (true, false) => {
                self.free_ranges[pos - 1].end = end;
            }
            (false, true) => {
                self.free_ranges[pos].start = start;
            }
            (false, false) => {
                self.free_ranges.insert(pos, FreeRange { start, end });
            }
        }
    }
}

/// 持久描述符分配器
///
/// 资源视图在创建时取一个槽位，在销毁时归还。多个视图共享同一个
/// 分配器（`Arc<Mutex<DescriptorAllocator>>`）。
pub struct DescriptorAllocator {
    device: Arc<dyn RenderDevice>,
    kind: HeapKind,
    descriptors_per_heap: u32,
    heaps: Vec<HeapEntry>,
}

impl DescriptorAllocator {
    /// 创建分配器；堆在第一次分配时才创建
    pub fn new(device: Arc<dyn RenderDevice>, kind: HeapKind, descriptors_per_heap: u32) -> Self {
        assert!(descriptors_per_heap > 0, "heap capacity must be non-zero");
        Self {
            device,
            kind,
            descriptors_per_heap,
            heaps: Vec::new(),
        }
    }

    /// 分配一个描述符槽位
    ///
    /// 所有堆都满时懒创建一个新堆。堆创建失败（设备错误）向上传播。
    pub fn allocate_slot(&mut self) -> Result<DescriptorSlot> {
        for (heap_index, entry) in self.heaps.iter_mut().enumerate() {
            if entry.has_free() {
                let ptr = entry.take_front();
                return Ok(Self::make_slot(entry, heap_index, ptr));
            }
        }

        let heap_index = self.heaps.len();
        let desc = DescriptorHeapDesc::new(self.kind, self.descriptors_per_heap)
            .with_name(format!("{} Allocator Heap {}", self.kind.name(), heap_index));
        let heap = self.device.create_descriptor_heap(&desc)?;
        debug!(
            kind = self.kind.name(),
            index = heap_index,
            capacity = self.descriptors_per_heap,
            "created descriptor heap"
        );

        let mut entry = HeapEntry::new(heap);
        let ptr = entry.take_front();
        let slot = Self::make_slot(&entry, heap_index, ptr);
        self.heaps.push(entry);
        Ok(slot)
    }

    /// 归还一个描述符槽位
    ///
    /// 按值消耗槽位。归还的区域与相邻空闲块双向合并。
    pub fn free_slot(&mut self, slot: DescriptorSlot) {
        assert!(
            slot.heap_index < self.heaps.len(),
            "descriptor slot does not belong to this allocator"
        );
        let entry = &mut self.heaps[slot.heap_index];
        let increment = entry.heap.increment_size() as usize;
        entry.insert_range(slot.cpu.ptr, slot.cpu.ptr + increment);
    }

    /// 堆池大小
    pub fn heap_count(&self) -> usize {
        self.heaps.len()
    }

    /// 当前空闲槽位总数
    pub fn free_count(&self) -> u32 {
        self.heaps
            .iter()
            .map(|entry| {
                let increment = entry.heap.increment_size() as usize;
                entry
                    .free_ranges
                    .iter()
                    .map(|r| ((r.end - r.start) / increment) as u32)
                    .sum::<u32>()
            })
            .sum()
    }

    fn make_slot(entry: &HeapEntry, heap_index: usize, ptr: usize) -> DescriptorSlot {
        let base = entry.heap.cpu_start().ptr;
        let index = ((ptr - base) / entry.heap.increment_size() as usize) as u32;
        DescriptorSlot {
            cpu: CpuDescriptorHandle::new(ptr, index),
            heap_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::testing::MockDevice;
    use rand::seq::SliceRandom;

    fn make_allocator(per_heap: u32) -> DescriptorAllocator {
        let device = Arc::new(MockDevice::new());
        DescriptorAllocator::new(device, HeapKind::CbvSrvUav, per_heap)
    }

    #[test]
    fn test_allocate_distinct_slots() {
        let mut allocator = make_allocator(8);
        let a = allocator.allocate_slot().unwrap();
        let b = allocator.allocate_slot().unwrap();
        assert_ne!(a.cpu().ptr, b.cpu().ptr);
        assert_eq!(allocator.heap_count(), 1);
    }

    #[test]
    fn test_free_and_reuse() {
        let mut allocator = make_allocator(8);
        let a = allocator.allocate_slot().unwrap();
        let ptr = a.cpu().ptr;
        allocator.free_slot(a);
        let b = allocator.allocate_slot().unwrap();
        assert_eq!(b.cpu().ptr, ptr);
    }

    #[test]
    fn test_exhaustion_grows_second_heap() {
        let mut allocator = make_allocator(4);
        let mut slots = Vec::new();
        for _ in 0..4 {
            slots.push(allocator.allocate_slot().unwrap());
        }
        assert_eq!(allocator.heap_count(), 1);
        assert_eq!(allocator.free_count(), 0);

        let extra = allocator.allocate_slot().unwrap();
        assert_eq!(allocator.heap_count(), 2);
        assert_eq!(extra.heap_index(), 1);
    }

    #[test]
    fn test_two_sided_coalescing() {
        let mut allocator = make_allocator(8);
        let mut slots = Vec::new();
        for _ in 0..5 {
            slots.push(allocator.allocate_slot().unwrap());
        }
        // 先释放两端，再释放中间，中间块必须把两侧并成一块
        let middle = slots.remove(2);
        let left = slots.remove(1);
        let right = slots.remove(1);
        allocator.free_slot(left);
        allocator.free_slot(right);
        assert_eq!(allocator.heaps[0].free_ranges.len(), 3);
        allocator.free_slot(middle);
        assert_eq!(allocator.heaps[0].free_ranges.len(), 2);
    }

    #[test]
    fn test_random_free_order_coalesces_fully() {
        let mut allocator = make_allocator(32);
        let mut slots = Vec::new();
        for _ in 0..32 {
            slots.push(allocator.allocate_slot().unwrap());
        }
        let mut rng = rand::thread_rng();
        slots.shuffle(&mut rng);
        for slot in slots {
            allocator.free_slot(slot);
        }
        // 全部释放后空闲列表必须合并回单个完整块
        assert_eq!(allocator.heaps[0].free_ranges.len(), 1);
        assert_eq!(allocator.free_count(), 32);
    }

    #[test]
    #[should_panic(expected = "overlaps")]
    fn test_overlapping_free_is_fatal() {
        let mut allocator = make_allocator(8);
        let a = allocator.allocate_slot().unwrap();
        let forged = DescriptorSlot {
            cpu: a.cpu(),
            heap_index: a.heap_index(),
        };
        allocator.free_slot(a);
        allocator.free_slot(forged);
    }

    #[test]
    fn test_handle_offset() {
        let handle = CpuDescriptorHandle::new(1000, 0);
        let offset = handle.offset(5, 32);
        assert_eq!(offset.ptr, 1160);
        assert_eq!(offset.index, 5);

        let gpu = GpuDescriptorHandle::new(2000, 0);
        let offset = gpu.offset(10, 32);
        assert_eq!(offset.ptr, 2320);
        assert_eq!(offset.index, 10);
    }
}
