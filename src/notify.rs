/*
 *  notify.rs
 *
 *  tickertape - LED stock ticker
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::io::Write;

use log::{info, warn};

/// Told when an applied report changed at least one displayed price.
pub trait Notifier: Send {
    fn prices_changed(&mut self);
}

/// Terminal bell plus a log line.
#[derive(Debug)]
pub struct BellNotifier<W: Write + Send = std::io::Stdout> {
    out: W,
}

impl BellNotifier {
    pub fn stdout() -> Self {
        Self { out: std::io::stdout() }
    }
}

impl<W: Write + Send> BellNotifier<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Notifier for BellNotifier<W> {
    fn prices_changed(&mut self) {
        info!("prices updated");
        if let Err(e) = self.out.write_all(b"\x07").and_then(|_| self.out.flush()) {
            warn!("bell failed: {}", e);
        }
    }
}

/// Swallows notifications, used when sound is off.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Notifier for Silent {
    fn prices_changed(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_written() {
        let mut n = BellNotifier::new(Vec::new());
        n.prices_changed();
        n.prices_changed();
        assert_eq!(n.into_inner(), vec![7u8, 7u8]);
    }
}
