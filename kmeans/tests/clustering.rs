use kmeans::schema::{ColumnSpec, FeatureCodec};
use kmeans::{
    ClusteringContext, Dataset, EmptyClusterPolicy, ExecutionEngine, KMeansError, LloydKmeans, NormalizedPoint, RayonEngine,
    SequentialEngine,
};

const RECORDS: [&str; 6] = [
    "0,tcp,http,SF,181,5450,0,0,0,0,0,1,0,0,0,0,0,0,0,0,0,0,8,8,0.00,0.00,0.00,0.00,1.00,0.00,0.00,9,9,1.00,0.00,0.11,0.00,0.00,0.00,0.00,0.00",
    "0,tcp,http,SF,239,486,0,0,0,0,0,1,0,0,0,0,0,0,0,0,0,0,8,8,0.00,0.00,0.00,0.00,1.00,0.00,0.00,19,19,1.00,0.00,0.05,0.00,0.00,0.00,0.00,0.00",
    "0,tcp,http,SF,235,1337,0,0,0,0,0,1,0,0,0,0,0,0,0,0,0,0,8,8,0.00,0.00,0.00,0.00,1.00,0.00,0.00,29,29,1.00,0.00,0.03,0.00,0.00,0.00,0.00,0.00",
    "0,icmp,ecr_i,SF,1032,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,511,511,0.00,0.00,0.00,0.00,1.00,0.00,0.00,255,255,1.00,0.00,1.00,0.00,0.00,0.00,0.00,0.00",
    "0,icmp,ecr_i,SF,1032,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,510,510,0.00,0.00,0.00,0.00,1.00,0.00,0.00,255,255,1.00,0.00,1.00,0.00,0.00,0.00,0.00,0.00",
    "0,tcp,private,REJ,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,136,1,0.00,0.00,1.00,1.00,0.01,0.06,0.00,255,1,0.00,0.06,0.00,0.00,0.00,0.00,1.00,1.00",
];

fn records() -> Vec<String> {
    RECORDS.iter().map(|r| r.to_string()).collect()
}

fn check_example<E: ExecutionEngine>(engine: &E) {
    let codec = FeatureCodec::new(',', vec![ColumnSpec::continuous(); 2]).unwrap();
    let points: Dataset<NormalizedPoint> = [[0.0, 0.0], [0.0, 1.0], [9.0, 9.0], [9.0, 10.0]]
        .iter()
        .map(|c| NormalizedPoint::new(c.to_vec(), 1.0))
        .collect();
    let centroids = vec![
        NormalizedPoint::new(vec![0.0, 0.0], 1.0).with_label(Some(0)),
        NormalizedPoint::new(vec![9.0, 9.0], 1.0).with_label(Some(1)),
    ];
    let run = LloydKmeans::new(engine, &codec, ClusteringContext::new(2)).run(points, centroids).unwrap();
    assert!(run.converged);
    assert_eq!(run.iterations, 2);
    assert_eq!(run.centroids[0].components(), &[0.0, 0.5]);
    assert_eq!(run.centroids[1].components(), &[9.0, 9.5]);
}

#[test]
fn example_converges_after_two_iterations() {
    check_example(&SequentialEngine);
    check_example(&RayonEngine::new(2).unwrap());
}

#[test]
fn kdd_records_cluster_and_render() {
    let codec = FeatureCodec::kdd_cup().unwrap();
    let engine = RayonEngine::new(0).unwrap();
    let context = ClusteringContext::new(2)
        .with_seed(42)
        .with_empty_cluster_policy(EmptyClusterPolicy::KeepPosition);
    let kmeans = LloydKmeans::new(&engine, &codec, context);
    let mut lines = records();
    lines.push(RECORDS[0].to_string());
    let run = kmeans.fit(lines).unwrap();

    assert!(run.converged);
    assert_eq!(run.points.len(), RECORDS.len());
    assert_eq!(run.cluster_sizes.iter().sum::<usize>(), RECORDS.len());

    for point in run.points.iter() {
        let rendered = point.render(&codec).unwrap();
        let fields: Vec<&str> = rendered.split(',').collect();
        assert_eq!(fields.len(), 42);
        let label: usize = fields[41].parse().unwrap();
        assert!(label < 2);
    }
}

#[test]
fn render_round_trips_every_record() {
    let codec = FeatureCodec::kdd_cup().unwrap();
    for record in RECORDS {
        let rendered = NormalizedPoint::parse(record, &codec).unwrap().render(&codec).unwrap();
        let original: Vec<&str> = record.split(',').collect();
        let fields: Vec<&str> = rendered.split(',').collect();
        assert_eq!(fields.len(), original.len() + 1);
        assert_eq!(fields[41], "-1");
        for (column, (got, want)) in fields.iter().zip(original.iter()).enumerate() {
            if codec.is_categorical(column) {
                assert_eq!(got, want, "column {}", column);
            } else {
                let got: f64 = got.parse().unwrap();
                let want: f64 = want.parse().unwrap();
                assert!((got - want).abs() < 0.0051, "column {}: {} vs {}", column, got, want);
            }
        }
    }
}

#[test]
fn k_larger_than_distinct_points() {
    let codec = FeatureCodec::kdd_cup().unwrap();
    let kmeans = LloydKmeans::new(&SequentialEngine, &codec, ClusteringContext::new(10));
    let mut lines = records();
    lines.extend(records());
    assert_eq!(
        kmeans.fit(lines).unwrap_err(),
        KMeansError::NoCentroids { requested: 10, available: RECORDS.len() }
    );
}

#[test]
fn unknown_protocol_is_reported() {
    let codec = FeatureCodec::kdd_cup().unwrap();
    let kmeans = LloydKmeans::new(&SequentialEngine, &codec, ClusteringContext::new(1));
    let mut lines = records();
    lines.push(RECORDS[0].replacen("tcp", "quic", 1));
    let err = kmeans.fit(lines).unwrap_err();
    assert_eq!(err, KMeansError::UnknownToken { column: 1, token: "quic".to_string() });
    assert_eq!(err.to_string(), "unknown token `quic` in categorical column 1");
}
