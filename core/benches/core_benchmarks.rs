use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use darkroom_core::gradient_slider::GradientSlider;
use darkroom_core::history::compress;
use darkroom_core::{
    Develop, HistoryController, HistoryEntry, IopOrder, ModuleInstance, ModuleRegistry,
    PipelineContext, Reconciler, UndoStack,
};

fn registry(ops: usize) -> ModuleRegistry {
    let mut iop = ModuleRegistry::new();
    for i in 0..ops {
        iop.insert(
            ModuleInstance::new(format!("op{i}"), format!("Op {i}"), i as f64)
                .with_default_params(vec![0]),
        );
    }
    iop
}

/// A history that edits every operation `steps` times, through `instances`
/// instances each.
fn history(ops: usize, instances: i32, steps: usize) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    for step in 0..steps {
        for i in 0..ops {
            for multi_priority in 0..instances {
                entries.push(HistoryEntry {
                    module: None,
                    op: format!("op{i}"),
                    multi_priority,
                    multi_name: String::new(),
                    enabled: true,
                    iop_order: IopOrder(i as f64 + multi_priority as f64 * 0.1),
                    params: vec![step as u8],
                });
            }
        }
    }
    entries
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

fn bench_reconcile_resurrect(c: &mut Criterion) {
    c.bench_function("reconcile_resurrect_40x3", |b| {
        b.iter_batched(
            || (registry(40), history(40, 3, 2)),
            |(mut iop, mut entries)| {
                let mut undo = UndoStack::default();
                black_box(Reconciler::new(&mut iop, &mut undo).run(&mut entries))
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_compress(c: &mut Criterion) {
    let entries = history(40, 2, 10);
    c.bench_function("compress_800_entries", |b| {
        b.iter(|| compress(black_box(&entries), black_box(entries.len())));
    });
}

// ---------------------------------------------------------------------------
// Undo / redo
// ---------------------------------------------------------------------------

fn bench_undo_redo_cycle(c: &mut Criterion) {
    let iop = registry(40);
    let ids = iop.ids().to_vec();
    let mut controller =
        HistoryController::new(PipelineContext::headless(Develop::with_modules(iop)), 100);
    for (step, &id) in ids.iter().cycle().take(80).enumerate() {
        let _ = controller.edit_module(id, vec![step as u8], true);
    }

    c.bench_function("undo_redo_80_steps", |b| {
        b.iter(|| {
            let _ = black_box(controller.undo());
            let _ = black_box(controller.redo());
        });
    });
}

// ---------------------------------------------------------------------------
// Gradient slider
// ---------------------------------------------------------------------------

fn bench_slider_drag(c: &mut Criterion) {
    c.bench_function("slider_drag_push_10_markers", |b| {
        let mut slider = GradientSlider::new(10);
        b.iter(|| {
            slider.begin_drag(0, black_box(1.0), 20);
            slider.drag_to(black_box(0.0));
            slider.end_drag(black_box(0.5));
            slider.take_value_changed()
        });
    });
}

criterion_group!(
    benches,
    bench_reconcile_resurrect,
    bench_compress,
    bench_undo_redo_cycle,
    bench_slider_drag,
);

criterion_main!(benches);
