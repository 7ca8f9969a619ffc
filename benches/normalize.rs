use criterion::{black_box, criterion_group, criterion_main, Criterion};

use molnorm::{label_components, normalize, Atom, Bond, BondOrder, Element, MolGraph};

/// A polymer-like backbone with periodic nitro groups and a covalent salt
/// pair at the end, sized to make the iterative DFS and the rule scans do
/// real work.
fn build_test_structure(units: usize) -> MolGraph {
    let mut mol = MolGraph::new();
    let mut prev = None;
    for i in 0..units {
        let c = mol.add_atom(Atom {
            num_h: 2,
            ..Atom::new(Element::C)
        });
        if let Some(p) = prev {
            mol.add_bond(p, c, Bond::default()).unwrap();
        }
        prev = Some(c);
        if i % 8 == 0 {
            let n = mol.add_atom(Atom {
                charge: 1,
                ..Atom::new(Element::N)
            });
            let o1 = mol.add_atom(Atom::new(Element::O));
            let o2 = mol.add_atom(Atom {
                charge: -1,
                ..Atom::new(Element::O)
            });
            mol.add_bond(c, n, Bond::default()).unwrap();
            mol.add_bond(n, o1, Bond::new(BondOrder::Double)).unwrap();
            mol.add_bond(n, o2, Bond::default()).unwrap();
        }
    }
    let na = mol.add_atom(Atom::new(Element::Na));
    let cl = mol.add_atom(Atom::new(Element::Cl));
    mol.add_bond(na, cl, Bond::default()).unwrap();
    mol
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    group.bench_function("polymer_64", |b| {
        b.iter(|| {
            let mut mol = build_test_structure(black_box(64));
            black_box(normalize(&mut mol).unwrap())
        })
    });
    group.bench_function("polymer_512", |b| {
        b.iter(|| {
            let mut mol = build_test_structure(black_box(512));
            black_box(normalize(&mut mol).unwrap())
        })
    });

    group.finish();
}

fn bench_components(c: &mut Criterion) {
    c.bench_function("label_components_4k", |b| {
        let mol = build_test_structure(4096);
        b.iter(|| {
            let mut m = mol.clone();
            black_box(label_components(&mut m))
        })
    });
}

criterion_group!(benches, bench_normalize, bench_components);
criterion_main!(benches);
