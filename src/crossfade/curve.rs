use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;
use std::f32::consts::PI;

/// 淡入淡出曲线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    #[default]
    Linear,
    /// 正弦/余弦，两路功率之和恒定
    EqualPower,
    /// 两端慢中间快
    SCurve,
}

impl FadeCurve {
    fn shape(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => t,
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
            FadeCurve::SCurve => (1.0 - (PI * t).cos()) * 0.5,
        }
    }

    /// 渐入一侧在进度 `t` 时的增益
    pub fn gain_in(self, t: f32) -> f32 {
        self.shape(t)
    }

    /// 渐出一侧在进度 `t` 时的增益
    pub fn gain_out(self, t: f32) -> f32 {
        self.shape(1.0 - t.clamp(0.0, 1.0))
    }
}
