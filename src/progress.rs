use std::io::{self, Write};

const BAR_WIDTH: usize = 50;

/// Carriage-return loading bar, cheap enough to call on every step: it only
/// redraws when `i * BAR_WIDTH` crosses a multiple of `max`.
pub fn show_loading(tag: &str, i: usize, max: usize) {
    if max == 0 || (i * BAR_WIDTH) % max != 0 {
        return;
    }
    let filled = i * BAR_WIDTH / max;

    print!("\r{:<20} [", tag);
    for _ in 0..filled.min(BAR_WIDTH) {
        print!("=");
    }
    for _ in filled..BAR_WIDTH {
        print!(" ");
    }
    print!("]");
    io::stdout().flush().unwrap();

    if i == max {
        println!();
    }
}
