#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomLifecycle {
    #[default]
    Idle,
    Receiving,
    Applying,
}

impl RoomLifecycle {
    pub fn is_busy(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

pub fn can_transition(from: RoomLifecycle, to: RoomLifecycle) -> bool {
    matches!(
        (from, to),
        (RoomLifecycle::Idle, RoomLifecycle::Receiving)
            | (RoomLifecycle::Receiving, RoomLifecycle::Applying)
            | (RoomLifecycle::Receiving, RoomLifecycle::Idle)
            | (RoomLifecycle::Applying, RoomLifecycle::Idle)
    ) || from == to
}
