use serde::{Deserialize, Serialize};

/// Kind of pointer activity reported by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    Move,
    Down,
    Up,
}

impl PointerKind {
    /// Name of the module entry point that receives this kind of event.
    pub fn entry_point(&self) -> &'static str {
        match self {
            PointerKind::Move => "onmousemove",
            PointerKind::Down => "onmousedown",
            PointerKind::Up => "onmouseup",
        }
    }
}

/// A pointer event in surface-local pixel coordinates.
///
/// Consumed as soon as it is dispatched; never queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: i32,
    pub y: i32,
}

impl PointerEvent {
    /// Build an event from host coordinates, truncating toward zero.
    pub fn from_surface(kind: PointerKind, x: f64, y: f64) -> Self {
        Self {
            kind,
            x: x as i32,
            y: y as i32,
        }
    }
}

impl std::fmt::Display for PointerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {})", self.kind.entry_point(), self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_surface_truncates() {
        let ev = PointerEvent::from_surface(PointerKind::Down, 10.9, 20.2);
        assert_eq!((ev.x, ev.y), (10, 20));

        let ev = PointerEvent::from_surface(PointerKind::Move, -0.5, 3.999);
        assert_eq!((ev.x, ev.y), (0, 3));
    }

    #[test]
    fn test_entry_points() {
        assert_eq!(PointerKind::Move.entry_point(), "onmousemove");
        assert_eq!(PointerKind::Down.entry_point(), "onmousedown");
        assert_eq!(PointerKind::Up.entry_point(), "onmouseup");
    }
}
