use std::fmt::Display;

/// What a page is showing right now.
#[derive(Debug, Clone, PartialEq)]
pub enum PageState<T> {
    Loading,
    Empty,
    Loaded(T),
    Failed(String),
}

impl<T> PageState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(v) => Some(v),
            _ => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Loaded(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Banner text for every state except `Loaded`.
    pub fn banner(&self, empty_message: &str) -> Option<String> {
        match self {
            Self::Loading => Some("Loading...".into()),
            Self::Empty => Some(empty_message.into()),
            Self::Failed(e) => Some(format!("Something went wrong: {}", e)),
            Self::Loaded(_) => None,
        }
    }
}

impl<I> PageState<Vec<I>> {
    /// A failed fetch is `Failed`, an empty list is `Empty`.
    pub fn from_result<E: Display>(result: Result<Vec<I>, E>) -> Self {
        match result {
            Err(e) => Self::Failed(e.to_string()),
            Ok(items) if items.is_empty() => Self::Empty,
            Ok(items) => Self::Loaded(items),
        }
    }

    pub fn items(&self) -> &[I] {
        self.loaded().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

/// Transient notification raised by an operation (vote, send...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub text: String,
}

impl Toast {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: ToastLevel::Error,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_result_maps_failure_empty_and_data() {
        let failed: PageState<Vec<u8>> = PageState::from_result(Err("timeout"));
        assert_eq!(failed.error(), Some("timeout"));
        assert_eq!(
            failed.banner("nothing").as_deref(),
            Some("Something went wrong: timeout")
        );

        let empty: PageState<Vec<u8>> = PageState::from_result(Ok::<_, String>(vec![]));
        assert_eq!(empty, PageState::Empty);
        assert_eq!(empty.banner("Nothing here yet.").as_deref(), Some("Nothing here yet."));
        assert!(empty.items().is_empty());

        let loaded = PageState::from_result(Ok::<_, String>(vec![1, 2]));
        assert_eq!(loaded.items(), &[1, 2]);
        assert!(loaded.banner("unused").is_none());
    }
}
