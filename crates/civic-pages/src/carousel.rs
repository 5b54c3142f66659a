/// Position in a rotating list of featured items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Carousel {
    index: usize,
    len: usize,
}

impl Carousel {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current position, `None` when there is nothing to show.
    pub fn index(&self) -> Option<usize> {
        (self.len > 0).then_some(self.index)
    }

    pub fn next(&mut self) {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
    }

    pub fn prev(&mut self) {
        if self.len > 0 {
            self.index = (self.index + self.len - 1) % self.len;
        }
    }

    pub fn go_to(&mut self, index: usize) {
        if self.len > 0 {
            self.index = index % self.len;
        }
    }

    /// Resize after the underlying list changed. Keeps the position when it
    /// still exists, otherwise starts over.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        if self.index >= len {
            self.index = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_forward_and_backward() {
        let mut c = Carousel::new(3);
        assert_eq!(c.index(), Some(0));
        c.prev();
        assert_eq!(c.index(), Some(2));
        c.next();
        c.next();
        assert_eq!(c.index(), Some(1));
        c.next();
        c.next();
        assert_eq!(c.index(), Some(0));
    }

    #[test]
    fn full_cycle_returns_home() {
        for len in 1..6 {
            let mut c = Carousel::new(len);
            c.go_to(len - 1);
            for _ in 0..len {
                c.next();
            }
            assert_eq!(c.index(), Some(len - 1));
            for _ in 0..len * 2 {
                c.prev();
            }
            assert_eq!(c.index(), Some(len - 1));
        }
    }

    #[test]
    fn empty_is_inert() {
        let mut c = Carousel::new(0);
        c.next();
        c.prev();
        c.go_to(4);
        assert_eq!(c.index(), None);
        assert!(c.is_empty());
    }

    #[test]
    fn reset_keeps_valid_position() {
        let mut c = Carousel::new(5);
        c.go_to(7);
        assert_eq!(c.index(), Some(2));
        c.reset(4);
        assert_eq!(c.index(), Some(2));
        c.reset(2);
        assert_eq!(c.index(), Some(0));
    }
}
