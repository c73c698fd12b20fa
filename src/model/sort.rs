use rand::seq::SliceRandom;

use super::item::SharedItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMethod {
    Date,
    Title,
    Flags,
    Author,
    Link,
    Guid,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy)]
pub struct SortStrategy {
    pub method: SortMethod,
    pub direction: SortDirection,
}

impl SortStrategy {
    pub fn new(method: SortMethod, direction: SortDirection) -> Self {
        SortStrategy { method, direction }
    }
}

/// Sorts items in place per `strategy`. `random` ignores direction and
/// Fisher-Yates shuffles using an OS-seeded RNG.
pub fn sort_items(items: &mut [SharedItem], strategy: SortStrategy) {
    if strategy.method == SortMethod::Random {
        items.shuffle(&mut rand::thread_rng());
        return;
    }

    items.sort_by(|a, b| {
        let a = a.lock().unwrap();
        let b = b.lock().unwrap();
        let ord = match strategy.method {
            SortMethod::Date => a.pub_date.cmp(&b.pub_date),
            SortMethod::Title => natural_cmp(&a.title, &b.title),
            SortMethod::Flags => a.flags.cmp(&b.flags),
            SortMethod::Author => natural_cmp(
                a.author.as_deref().unwrap_or(""),
                b.author.as_deref().unwrap_or(""),
            ),
            SortMethod::Link => a.link.cmp(&b.link),
            SortMethod::Guid => a.guid.cmp(&b.guid),
            SortMethod::Random => unreachable!(),
        };
        match strategy.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

/// Locale-agnostic natural comparison: splits runs of digits and compares
/// them numerically, falls back to byte comparison for non-digit runs.
pub fn natural_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek(), bi.peek()) {
            (None, None) => return std::cmp::Ordering::Equal,
            (None, Some(_)) => return std::cmp::Ordering::Less,
            (Some(_), None) => return std::cmp::Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut ai);
                    let nb = take_number(&mut bi);
                    if na != nb {
                        return na.cmp(&nb);
                    }
                } else {
                    let ca = *ca;
                    let cb = *cb;
                    if ca != cb {
                        return ca.cmp(&cb);
                    }
                    ai.next();
                    bi.next();
                }
            }
        }
    }
}

fn take_number(it: &mut std::iter::Peekable<std::str::Chars>) -> u64 {
    let mut n: u64 = 0;
    while let Some(c) = it.peek() {
        if c.is_ascii_digit() {
            n = n.saturating_mul(10).saturating_add(c.to_digit(10).unwrap() as u64);
            it.next();
        } else {
            break;
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_compare_orders_numbers_numerically() {
        assert_eq!(natural_cmp("item2", "item10"), std::cmp::Ordering::Less);
        assert_eq!(natural_cmp("item10", "item2"), std::cmp::Ordering::Greater);
        assert_eq!(natural_cmp("abc", "abc"), std::cmp::Ordering::Equal);
    }
}
