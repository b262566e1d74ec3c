use kube::CustomResourceExt;
use operator::podfriend_controller::PodFriend;

use clap::Parser;
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    // Output directory
    #[arg(short, long, default_value = ".")]
    output: String,
}
fn main() {
    let args = Args::parse();
    // Create directory if it does not exist
    std::fs::create_dir_all(&args.output).unwrap();
    std::fs::write(
        format!("{}/podfriend.yaml", args.output),
        serde_yaml::to_string(&PodFriend::crd()).unwrap(),
    )
    .unwrap();
}
