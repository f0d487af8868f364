//! 每帧 GPU 可见描述符缓存
//!
//! 绑定描述符表之前，把分散在 CPU 侧堆中的描述符拷贝到一块连续的
//! 着色器可见区域。缓存是一个每帧重置一次的环：偏移单调前进，
//! `reset_cached_heaps` 在帧开始时归零。
//!
//! 本缓存假定每帧结束后完整等待 GPU 空闲（单帧飞行），因此重置
//! 不需要任何围栏跟踪。

use std::sync::Arc;

use crate::core::error::Result;
use super::descriptor::{CpuDescriptorHandle, GpuDescriptorHandle};
use super::device::{DescriptorHeap, DescriptorHeapDesc, HeapKind, RenderDevice};

/// 每帧描述符缓存
pub struct DescriptorCacheGpu {
    device: Arc<dyn RenderDevice>,
    cbv_srv_uav_heap: Box<dyn DescriptorHeap>,
    rtv_heap: Box<dyn DescriptorHeap>,
    capacity: u32,
    cbv_srv_uav_offset: u32,
    rtv_offset: u32,
}

impl DescriptorCacheGpu {
    /// 创建缓存，两个区域各 `capacity` 个描述符
    pub fn new(device: Arc<dyn RenderDevice>, capacity: u32) -> Result<Self> {
        assert!(capacity > 0, "descriptor cache capacity must be non-zero");

        let cbv_srv_uav_heap = device.create_descriptor_heap(
            &DescriptorHeapDesc::new(HeapKind::CbvSrvUav, capacity)
                .with_shader_visible(true)
                .with_name("GPU Cached CBV/SRV/UAV Heap"),
        )?;
        let rtv_heap = device.create_descriptor_heap(
            &DescriptorHeapDesc::new(HeapKind::Rtv, capacity).with_name("GPU Cached RTV Heap"),
        )?;

        Ok(Self {
            device,
            cbv_srv_uav_heap,
            rtv_heap,
            capacity,
            cbv_srv_uav_offset: 0,
            rtv_offset: 0,
        })
    }

    /// 把一组 CBV/SRV/UAV 描述符拷贝到着色器可见区域
    ///
    /// 返回第一个描述符的 GPU 句柄，作为描述符表的基址。
    /// 超出容量是致命错误（调用方漏掉了帧开始的重置）。
    pub fn append_cbv_srv_uav_descriptors(
        &mut self,
        descriptors: &[CpuDescriptorHandle],
    ) -> GpuDescriptorHandle {
        let count = descriptors.len() as u32;
        assert!(
            self.cbv_srv_uav_offset + count <= self.capacity,
            "CBV/SRV/UAV descriptor cache overflow: {} + {} > {}",
            self.cbv_srv_uav_offset,
            count,
            self.capacity
        );

        let increment = self.cbv_srv_uav_heap.increment_size();
        let dst = self
            .cbv_srv_uav_heap
            .cpu_start()
            .offset(self.cbv_srv_uav_offset, increment);
        self.device
            .copy_descriptors(HeapKind::CbvSrvUav, dst, descriptors);

        // 着色器可见堆必然有 GPU 起始句柄
        let gpu_start = match self.cbv_srv_uav_heap.gpu_start() {
            Some(start) => start,
            None => panic!("cached CBV/SRV/UAV heap is not shader visible"),
        };
        let gpu = gpu_start.offset(self.cbv_srv_uav_offset, increment);

        self.cbv_srv_uav_offset += count;
        gpu
    }

    /// 把一组 RTV 描述符拷贝到缓存区域
    ///
    /// 返回 (GPU 句柄, CPU 句柄)。RTV 堆不可着色器可见，此时
    /// GPU 句柄以零基址计算，仅作为区域内的相对定位使用。
    pub fn append_rtv_descriptors(
        &mut self,
        descriptors: &[CpuDescriptorHandle],
    ) -> (GpuDescriptorHandle, CpuDescriptorHandle) {
        let count = descriptors.len() as u32;
        assert!(
            self.rtv_offset + count <= self.capacity,
            "RTV descriptor cache overflow: {} + {} > {}",
            self.rtv_offset,
            count,
            self.capacity
        );

        let increment = self.rtv_heap.increment_size();
        let dst = self.rtv_heap.cpu_start().offset(self.rtv_offset, increment);
        self.device.copy_descriptors(HeapKind::Rtv, dst, descriptors);

        let gpu = self
            .rtv_heap
            .gpu_start()
            .unwrap_or(GpuDescriptorHandle::new(0, 0))
            .offset(self.rtv_offset, increment);

        self.rtv_offset += count;
        (gpu, dst)
    }

    /// 重置两个区域的偏移（每帧开始时调用一次）
    pub fn reset_cached_heaps(&mut self) {
        self.cbv_srv_uav_offset = 0;
        self.rtv_offset = 0;
    }

    /// 着色器可见堆（录制命令列表时需要先设置）
    pub fn cbv_srv_uav_heap(&self) -> &dyn DescriptorHeap {
        self.cbv_srv_uav_heap.as_ref()
    }

    /// 当前 CBV/SRV/UAV 区域已使用的描述符数
    pub fn cbv_srv_uav_used(&self) -> u32 {
        self.cbv_srv_uav_offset
    }

    /// 当前 RTV 区域已使用的描述符数
    pub fn rtv_used(&self) -> u32 {
        self.rtv_offset
    }
}
