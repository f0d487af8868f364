//! 类型化资源视图
//!
//! 一个 [`ResourceView`] 把一个持久描述符槽位和写在其中的视图绑定
//! 在一起：构造时从共享分配器取槽位并让设备写入视图，`Drop` 时把
//! 槽位归还，且只归还一次。
//!
//! 交换链 RTV 等外部管理的描述符用 [`ResourceView::from_existing`]
//! 包装，不持有槽位，析构时不做归还。

use std::sync::{Arc, Mutex};

use crate::core::error::Result;
use super::descriptor::{CpuDescriptorHandle, DescriptorAllocator, DescriptorSlot};
use super::device::{GpuResource, RenderDevice, ViewDescription};

/// 视图类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    ShaderResource,
    RenderTarget,
    DepthStencil,
    UnorderedAccess,
}

impl ViewKind {
    fn from_description(desc: &ViewDescription) -> Self {
        match desc {
            ViewDescription::ShaderResource { .. } => ViewKind::ShaderResource,
            ViewDescription::RenderTarget { .. } => ViewKind::RenderTarget,
            ViewDescription::DepthStencil { .. } => ViewKind::DepthStencil,
            ViewDescription::UnorderedAccess { .. } => ViewKind::UnorderedAccess,
        }
    }
}

/// 资源视图
pub struct ResourceView {
    kind: ViewKind,
    cpu: CpuDescriptorHandle,
    slot: Option<DescriptorSlot>,
    allocator: Option<Arc<Mutex<DescriptorAllocator>>>,
}

impl ResourceView {
    /// 创建视图：分配槽位并在其中写入视图描述
    pub fn new(
        device: &dyn RenderDevice,
        allocator: Arc<Mutex<DescriptorAllocator>>,
        desc: &ViewDescription,
        resource: &dyn GpuResource,
    ) -> Result<Self> {
        let slot = {
            let mut guard = allocator.lock().unwrap_or_else(|e| e.into_inner());
            guard.allocate_slot()?
        };
        let cpu = slot.cpu();
        device.create_view(desc, resource, cpu)?;

        Ok(Self {
            kind: ViewKind::from_description(desc),
            cpu,
            slot: Some(slot),
            allocator: Some(allocator),
        })
    }

    /// 包装一个外部管理的描述符（例如交换链的 RTV）
    ///
    /// 不持有槽位，析构时不归还。
    pub fn from_existing(kind: ViewKind, cpu: CpuDescriptorHandle) -> Self {
        Self {
            kind,
            cpu,
            slot: None,
            allocator: None,
        }
    }

    /// 视图类别
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// 视图所在的 CPU 描述符句柄
    pub fn cpu_handle(&self) -> CpuDescriptorHandle {
        self.cpu
    }
}

impl Drop for ResourceView {
    fn drop(&mut self) {
        if let (Some(slot), Some(allocator)) = (self.slot.take(), self.allocator.as_ref()) {
            let mut guard = allocator.lock().unwrap_or_else(|e| e.into_inner());
            guard.free_slot(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::device::HeapKind;
    use crate::rhi::testing::{srv_desc, MockDevice, MockResource};

    fn make_allocator(device: &Arc<MockDevice>) -> Arc<Mutex<DescriptorAllocator>> {
        Arc::new(Mutex::new(DescriptorAllocator::new(
            Arc::clone(device) as Arc<dyn RenderDevice>,
            HeapKind::CbvSrvUav,
            8,
        )))
    }

    #[test]
    fn test_view_writes_descriptor() {
        let device = Arc::new(MockDevice::new());
        let allocator = make_allocator(&device);
        let resource = MockResource::new("crate texture");

        let view =
            ResourceView::new(device.as_ref(), Arc::clone(&allocator), &srv_desc(), &resource)
                .unwrap();
        assert_eq!(view.kind(), ViewKind::ShaderResource);

        let views = device.views.lock().unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].desc, srv_desc());
        assert_eq!(views[0].dst, view.cpu_handle());
        assert_eq!(views[0].resource_name, "crate texture");
    }

    #[test]
    fn test_drop_returns_slot_exactly_once() {
        let device = Arc::new(MockDevice::new());
        let allocator = make_allocator(&device);
        let resource = MockResource::new("tex");

        let ptr = {
            let view =
                ResourceView::new(device.as_ref(), Arc::clone(&allocator), &srv_desc(), &resource)
                    .unwrap();
            assert_eq!(allocator.lock().unwrap().free_count(), 7);
            view.cpu_handle().ptr
        };

        // 析构后槽位回到空闲列表，且可以被重用
        assert_eq!(allocator.lock().unwrap().free_count(), 8);
        let view2 =
            ResourceView::new(device.as_ref(), Arc::clone(&allocator), &srv_desc(), &resource)
                .unwrap();
        assert_eq!(view2.cpu_handle().ptr, ptr);
    }

    #[test]
    fn test_non_owning_view_skips_free() {
        let device = Arc::new(MockDevice::new());
        let allocator = make_allocator(&device);
        let resource = MockResource::new("tex");

        // 先建一个占槽位的视图，确保分配器已经有堆
        let owned =
            ResourceView::new(device.as_ref(), Arc::clone(&allocator), &srv_desc(), &resource)
                .unwrap();
        let free_before = allocator.lock().unwrap().free_count();

        {
            let external = ResourceView::from_existing(
                ViewKind::RenderTarget,
                CpuDescriptorHandle::new(0xABCD, 0),
            );
            assert_eq!(external.kind(), ViewKind::RenderTarget);
        }

        // 外部视图析构不影响分配器
        assert_eq!(allocator.lock().unwrap().free_count(), free_before);
        drop(owned);
    }
}
