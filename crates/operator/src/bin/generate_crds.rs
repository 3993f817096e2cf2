use kube::CustomResourceExt;
use trainjob_operator::crd::TrainJob;

fn main() {
    println!("---");
    println!("# TrainJob CRD");
    println!("{}", serde_yaml::to_string(&TrainJob::crd()).unwrap());
}
