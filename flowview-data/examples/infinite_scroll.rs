// Example: scrolling a chunk-cached flow-log list with debounced loads.
use flowview_data::{ListController, VecSource, ViewConfig};

#[derive(Clone, Debug)]
struct Flow {
    src: String,
    bytes: u64,
}

fn main() {
    let rows: Vec<Flow> = (0..50_000u64)
        .map(|i| Flow {
            src: format!("10.0.{}.{}", i / 256 % 256, i % 256),
            bytes: i * 37 % 9_000,
        })
        .collect();

    let config = ViewConfig {
        chunk_size: 200,
        max_cached_chunks: 4,
        ..ViewConfig::default()
    };
    let mut list = ListController::new(&config, VecSource::new(rows));

    futures::executor::block_on(async {
        if let Err(err) = list.load_visible(0).await {
            eprintln!("initial load failed: {err}");
            return;
        }
        println!("body={:?} total_size={}", list.body_state(), list.window().total_size());

        // A burst of scroll events; only the last one is loaded once the debounce elapses.
        let mut now = 0;
        for offset in [36_000, 72_000, 360_000] {
            now += 10;
            list.on_scroll(offset, now);
        }
        let loaded = list.tick(now + config.debounce_ms).await;
        println!("tick loaded={loaded:?} stats={:?}", list.store().stats());

        let frame = list.frame(|f, i| format!("#{i} {} {}B", f.src, f.bytes));
        println!("range={:?} skeletons={}", frame.range, frame.skeleton_count());
        if let Some(row) = frame.rows.first() {
            println!("first={:?}", row.content);
        }
    });
}
