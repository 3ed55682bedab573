// Example: a fixed-height flow-log list with one hundred thousand rows.
use flowview::{Align, Window, WindowOptions, render_list};

fn main() {
    let rows: Vec<String> = (0..100_000)
        .map(|i| format!("10.0.{}.{} -> 443", i / 256 % 256, i % 256))
        .collect();

    let mut w = Window::new(WindowOptions::new(rows.len(), 36).with_overscan(5));
    w.apply_scroll(400, 1_800_000);

    let frame = render_list(&w, |i| rows.get(i), |row: &String, i| format!("#{i} {row}"));
    println!("total_size={}", frame.total_size);
    println!("range={:?} materialized={}", frame.range, frame.rows.len());
    println!("first={:?}", frame.rows.first());

    let off = w.scroll_to_index(99_999, Align::End);
    println!("after scroll_to_index: offset={off} range={:?}", w.virtual_range());
}
