use merkle_commit::{
    build_root, hash_pair, hash_record, prove_membership, verify, Digest, LeafTarget, MerkleProof,
    MerkleTree,
};
use proptest::prelude::*;

fn h(s: &str) -> Digest {
    hash_record(s.as_bytes())
}

fn leaf_set() -> impl Strategy<Value = Vec<Digest>> {
    prop::collection::vec(any::<[u8; 32]>().prop_map(Digest::new), 1..40)
}

#[test]
fn bob_alice_david_eve_scenario() {
    let leaves = vec![h("bob"), h("alice"), h("david"), h("eve")];
    let ba = hash_pair(&h("bob"), &h("alice"));
    let de = hash_pair(&h("david"), &h("eve"));
    let root = hash_pair(&ba, &de);

    assert_eq!(build_root(&leaves).unwrap(), root);

    let proof = prove_membership(&leaves, LeafTarget::Value(h("bob"))).unwrap();
    assert_eq!(proof.siblings(), &[h("alice"), de]);

    assert!(verify(&proof, &root, &h("bob")));
    assert!(!verify(&proof, &root, &h("eve")));
}

#[test]
fn three_leaf_tree_rebuilds_consistently() {
    let leaves = vec![h("x"), h("y"), h("z")];
    let first = MerkleTree::build(&leaves).unwrap();
    let second = MerkleTree::build(&leaves).unwrap();
    assert_eq!(first.root(), second.root());

    for (i, leaf) in leaves.iter().enumerate() {
        let proof = first.prove(i).unwrap();
        assert!(verify(&proof, &second.root(), leaf), "leaf {i}");
    }
}

#[test]
fn sibling_swap_keeps_root_but_cross_pair_move_does_not() {
    let (a, b, c, d) = (h("a"), h("b"), h("c"), h("d"));
    let base = build_root(&[a, b, c, d]).unwrap();

    assert_eq!(build_root(&[b, a, c, d]).unwrap(), base);
    assert_eq!(build_root(&[b, a, d, c]).unwrap(), base);
    assert_ne!(build_root(&[a, c, b, d]).unwrap(), base);
}

#[test]
fn proof_from_another_tree_is_rejected() {
    let ours = vec![h("bob"), h("alice"), h("david")];
    let theirs = vec![h("bob"), h("alice"), h("carol")];
    let proof = prove_membership(&ours, LeafTarget::Index(0)).unwrap();
    let other_root = build_root(&theirs).unwrap();

    assert!(!verify(&proof, &other_root, &h("bob")));
}

#[test]
fn truncated_and_padded_proofs_fail() {
    let leaves: Vec<Digest> = (0u8..8).map(|i| hash_record(&[i])).collect();
    let root = build_root(&leaves).unwrap();
    let proof = prove_membership(&leaves, LeafTarget::Index(5)).unwrap();
    assert_eq!(proof.len(), 3);

    let mut short = proof.clone().into_siblings();
    short.pop();
    assert!(!verify(&MerkleProof::new(short), &root, &leaves[5]));

    let mut long = proof.into_siblings();
    long.push(hash_record(b"extra"));
    assert!(!verify(&MerkleProof::new(long), &root, &leaves[5]));

    assert!(!verify(&MerkleProof::default(), &root, &leaves[5]));
}

proptest! {
    #[test]
    fn build_is_deterministic(leaves in leaf_set()) {
        prop_assert_eq!(build_root(&leaves).unwrap(), build_root(&leaves).unwrap());
    }

    #[test]
    fn every_leaf_round_trips(leaves in leaf_set()) {
        let tree = MerkleTree::build(&leaves).unwrap();
        let root = tree.root();
        for (i, leaf) in leaves.iter().enumerate() {
            let proof = prove_membership(&leaves, LeafTarget::Index(i)).unwrap();
            prop_assert!(verify(&proof, &root, leaf));
            prop_assert!(proof.len() <= tree.depth());
        }
    }

    #[test]
    fn flipped_byte_breaks_proof(
        leaves in prop::collection::vec(any::<[u8; 32]>().prop_map(Digest::new), 2..40),
        pick in any::<prop::sample::Index>(),
        step in any::<prop::sample::Index>(),
        byte in 0usize..32,
        mask in 1u8..=255,
    ) {
        let index = pick.index(leaves.len());
        let root = build_root(&leaves).unwrap();
        let proof = prove_membership(&leaves, LeafTarget::Index(index)).unwrap();
        prop_assume!(!proof.is_empty());

        let mut siblings = proof.into_siblings();
        let at = step.index(siblings.len());
        let mut bytes = siblings[at].into_bytes();
        bytes[byte] ^= mask;
        siblings[at] = Digest::new(bytes);

        prop_assert!(!verify(&MerkleProof::new(siblings), &root, &leaves[index]));
    }

    #[test]
    fn unrelated_root_is_rejected(leaves in leaf_set(), other in any::<[u8; 32]>()) {
        let root = build_root(&leaves).unwrap();
        let other = Digest::new(other);
        prop_assume!(other != root);

        let proof = prove_membership(&leaves, LeafTarget::Index(0)).unwrap();
        prop_assert!(!verify(&proof, &other, &leaves[0]));
    }
}
