use super::Channel;

/// 两个通道槽位的名字；“谁是当前”只是一个角色标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Primary,
    Secondary,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::Primary => Slot::Secondary,
            Slot::Secondary => Slot::Primary,
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Primary => f.write_str("primary"),
            Slot::Secondary => f.write_str("secondary"),
        }
    }
}

/// 固定的两个通道，`swap` 只翻转角色
pub struct ChannelPair<C> {
    primary: C,
    secondary: C,
    active: Slot,
}

impl<C: Channel> ChannelPair<C> {
    pub fn new(primary: C, secondary: C) -> Self {
        Self {
            primary,
            secondary,
            active: Slot::Primary,
        }
    }

    pub fn active_slot(&self) -> Slot {
        self.active
    }

    pub fn idle_slot(&self) -> Slot {
        self.active.other()
    }

    pub fn get(&self, slot: Slot) -> &C {
        match slot {
            Slot::Primary => &self.primary,
            Slot::Secondary => &self.secondary,
        }
    }

    pub fn get_mut(&mut self, slot: Slot) -> &mut C {
        match slot {
            Slot::Primary => &mut self.primary,
            Slot::Secondary => &mut self.secondary,
        }
    }

    pub fn active(&self) -> &C {
        self.get(self.active)
    }

    pub fn active_mut(&mut self) -> &mut C {
        self.get_mut(self.active)
    }

    pub fn idle(&self) -> &C {
        self.get(self.idle_slot())
    }

    pub fn idle_mut(&mut self) -> &mut C {
        self.get_mut(self.idle_slot())
    }

    /// 同时拿到 (当前, 空闲) 两个通道
    pub fn both_mut(&mut self) -> (&mut C, &mut C) {
        match self.active {
            Slot::Primary => (&mut self.primary, &mut self.secondary),
            Slot::Secondary => (&mut self.secondary, &mut self.primary),
        }
    }

    pub fn swap(&mut self) {
        self.active = self.active.other();
    }
}
