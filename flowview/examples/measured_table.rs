// Example: estimated row heights, measurement, and table projection.
use flowview::{
    ColumnDef, ItemSize, Key, TableBody, TextAlign, Window, WindowOptions, render_table,
};

#[derive(Clone, Debug)]
struct Flow {
    id: u64,
    target: String,
    bytes: u32,
}

fn main() {
    let flows: Vec<Flow> = (0..1_000)
        .map(|i| Flow {
            id: 10_000 + i,
            target: format!("10.0.0.{}", i % 8),
            bytes: (i as u32 * 37) % 4096,
        })
        .collect();

    let ids: Vec<u64> = flows.iter().map(|f| f.id).collect();
    let mut w = Window::new(
        WindowOptions::new_with_key(flows.len(), ItemSize::estimated(|_| 24), move |i| ids[i])
            .with_overscan(2),
    );
    w.apply_scroll(120, 240);
    println!("before: off={} total={}", w.scroll_offset(), w.total_size());

    // A row above the viewport grows; the offset moves with it so content does not jump.
    let applied = w.measure(3, 48);
    println!("measure(3): applied={applied} off={} total={}", w.scroll_offset(), w.total_size());

    let columns: Vec<ColumnDef<Flow>> = vec![
        ColumnDef::new("target", "Target", |f: &Flow| f.target.clone().into()).fixed_width(140.0),
        ColumnDef::new("bytes", "Bytes", |f: &Flow| f.bytes.into())
            .align(TextAlign::Right)
            .with_render(|v, _, _| format!("{v} B")),
    ];

    w.handle_key(Key::ArrowDown);
    w.handle_key(Key::End);
    println!("selected={:?} off={}", w.selected(), w.scroll_offset());

    let table = render_table(&w, &columns, |i| flows.get(i));
    if let TableBody::Rows(frame) = table.body {
        for row in frame.rows.iter().rev().take(3) {
            println!("{:>4} @{:<6} {:?}", row.index, row.start, row.content);
        }
    }
}
