fn main() {
    std::process::exit(motionrec_lib::run());
}
