use std::collections::BTreeSet;

/// 1-based indices of the chosen options.
pub type Selection = BTreeSet<usize>;

/// Every option of a list with `len` entries.
pub fn select_all(len: usize) -> Selection {
    (1..=len).collect()
}

/// Toggles `choice` in `selection`.
pub fn apply_toggle(selection: &Selection, choice: usize) -> Selection {
    let mut toggled = selection.clone();
    if !toggled.remove(&choice) {
        toggled.insert(choice);
    }
    toggled
}

/// One line typed at the selection menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuInput {
    Confirm,
    Toggle(usize),
    OutOfRange,
    Invalid,
}

/// `0` confirms, `1..=option_count` toggles.
pub fn parse_menu_input(line: &str, option_count: usize) -> MenuInput {
    match line.trim().parse::<usize>() {
        Ok(0) => MenuInput::Confirm,
        Ok(choice) if choice <= option_count => MenuInput::Toggle(choice),
        Ok(_) => MenuInput::OutOfRange,
        Err(_) => MenuInput::Invalid,
    }
}

/// The options picked by `selection`, in option order.
pub fn resolve<T: Clone>(options: &[T], selection: &Selection) -> Vec<T> {
    selection
        .iter()
        .filter_map(|index| index.checked_sub(1).and_then(|i| options.get(i)))
        .cloned()
        .collect()
}

/// Builds a selection from option names, failing on the first unknown one.
pub fn select_named<T, S>(options: &[T], names: &[S]) -> Result<Selection, String>
where
    T: AsRef<str>,
    S: AsRef<str>,
{
    names
        .iter()
        .map(|name| {
            options
                .iter()
                .position(|option| option.as_ref() == name.as_ref())
                .map(|i| i + 1)
                .ok_or_else(|| name.as_ref().to_string())
        })
        .collect()
}
