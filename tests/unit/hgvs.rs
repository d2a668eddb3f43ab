use variant_annotator::hgvs::make_hgvs;
use variant_annotator::VariantClass;

#[test]
fn notation_by_variant_shape() {
    let cases = [
        ("1", 100, "A", "T", "1:g.100A>T", VariantClass::Substitution),
        ("1", 100, "AT", "A", "1:g.101del", VariantClass::Deletion),
        ("2", 200, "ACGT", "A", "2:g.201_203del", VariantClass::Deletion),
        ("X", 300, "G", "GAA", "X:g.300_301insAA", VariantClass::Insertion),
        ("7", 400, "ACG", "TTA", "7:g.400_402delinsTTA", VariantClass::DeletionInsertion),
        ("MT", 50, "GAT", "GCT", "MT:g.51A>C", VariantClass::Substitution),
    ];

    for (chrom, pos, r, a, expected, class) in cases {
        let (notation, kind) = make_hgvs(chrom, pos, r, a);
        assert_eq!(notation, expected, "{chrom}:{pos} {r}>{a}");
        assert_eq!(kind, class);
    }
}

#[test]
fn variant_class_labels() {
    assert_eq!(VariantClass::Substitution.to_string(), "sub");
    assert_eq!(VariantClass::DeletionInsertion.to_string(), "delins");
    assert_eq!("ins".parse::<VariantClass>().unwrap(), VariantClass::Insertion);
}
