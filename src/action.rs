#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    Scroll(Scroll),
    CycleSortMode,
    Refresh,
    None,
}
