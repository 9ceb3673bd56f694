use super::{Ready, Token};

/// A readiness event returned by [`Epoll::wait`](super::Epoll::wait).
///
/// Pairs a [`Ready`] bitset with the [`Token`] the fd was registered under.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Event {
    kind: Ready,
    token: Token,
}

impl Event {
    pub fn new(readiness: Ready, token: Token) -> Event {
        Event {
            kind: readiness,
            token,
        }
    }

    pub fn readiness(&self) -> Ready {
        self.kind
    }

    pub fn token(&self) -> Token {
        self.token
    }
}
