//! 组件基类

/// 组件 trait
///
/// 游戏对象上可挂载的组件的基础接口
pub trait Component {
    /// 组件名称
    fn name(&self) -> &str;

    /// 每帧更新（可选实现）
    fn tick(&mut self, _delta_time: f32) {}
}
