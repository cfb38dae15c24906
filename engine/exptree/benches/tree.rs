use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use exptree::{Branch, ExperienceTree, Slot, TreeFile};
use games_hexapawn::{parse_move, Hexapawn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tempfile::tempdir;

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_store");

    group.bench_function("append", |b| {
        let dir = tempdir().unwrap();
        let mut store = TreeFile::create(dir.path().join("bench.tree")).unwrap();
        let branch = Branch::new(parse_move("b1b2").unwrap());
        b.iter(|| store.append(&branch).unwrap());
    });

    group.bench_function("read", |b| {
        let dir = tempdir().unwrap();
        let mut store = TreeFile::create(dir.path().join("bench.tree")).unwrap();
        for _ in 0..1024 {
            store.append(&Branch::new(parse_move("b1b2").unwrap())).unwrap();
        }
        let mut slot = 0i32;
        b.iter(|| {
            slot = (slot + 1) % 1024;
            store.read(Slot::from_raw(slot)).unwrap()
        });
    });

    group.finish();
}

fn bench_tree_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("experience_tree");

    // A store holding one full opening line plus root alternatives.
    let line = ["b1b2", "c3b2", "c1c2"];
    let build = |path: &std::path::Path| {
        let mut tree = ExperienceTree::create(path).unwrap();
        let mut game = Hexapawn::new();
        let mut moves = Vec::new();
        for text in line {
            let mv = parse_move(text).unwrap();
            tree.remember_position(&game, &moves, mv, 1000, 10, 1, 0).unwrap();
            game.make_move(mv);
            moves.push(mv);
        }
        tree
    };

    group.bench_function("remember_update", |b| {
        let dir = tempdir().unwrap();
        let mut tree = build(&dir.path().join("bench.tree"));
        let game = Hexapawn::new();
        let mv = parse_move("b1b2").unwrap();
        b.iter(|| tree.remember_position(&game, &[], mv, 1000, 10, 1, 0).unwrap());
    });

    group.bench_function("familiar_position", |b| {
        let dir = tempdir().unwrap();
        let mut tree = build(&dir.path().join("bench.tree"));
        let game = Hexapawn::new();
        b.iter_batched(
            || ChaCha20Rng::seed_from_u64(42),
            |mut rng| tree.familiar_position(&game, &[], 100, &mut rng).unwrap(),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_store, bench_tree_ops);
criterion_main!(benches);
