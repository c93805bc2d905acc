/// Defines experiment phases and behavior
pub trait Phase: Copy + Clone + PartialEq + Send + Sync + std::fmt::Debug + Default {
    fn allows_response(&self) -> bool;
    fn next(&self) -> Option<Self>;

    fn is_welcome(&self) -> bool {
        false
    }
    fn is_search(&self) -> bool {
        false
    }
    fn is_debrief(&self) -> bool {
        false
    }
}

/// The standard single-session flow: instructions, the search blocks, debrief.
#[derive(Copy, Debug, Clone, PartialEq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    Search,
    Debrief,
}

impl Phase for SessionPhase {
    fn allows_response(&self) -> bool {
        matches!(self, Self::Search)
    }

    fn next(&self) -> Option<Self> {
        match self {
            Self::Welcome => Some(Self::Search),
            Self::Search => Some(Self::Debrief),
            Self::Debrief => None,
        }
    }

    fn is_welcome(&self) -> bool {
        matches!(self, Self::Welcome)
    }

    fn is_search(&self) -> bool {
        matches!(self, Self::Search)
    }

    fn is_debrief(&self) -> bool {
        matches!(self, Self::Debrief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_order_and_terminate() {
        let mut phase = SessionPhase::default();
        assert!(phase.is_welcome());

        phase = phase.next().unwrap();
        assert!(phase.is_search());
        assert!(phase.allows_response());

        phase = phase.next().unwrap();
        assert!(phase.is_debrief());
        assert!(phase.next().is_none());
    }

    #[test]
    fn only_search_accepts_responses() {
        assert!(!SessionPhase::Welcome.allows_response());
        assert!(!SessionPhase::Debrief.allows_response());
    }
}
