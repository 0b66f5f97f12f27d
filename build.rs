fn main() {
    // Only the device build links against ESP-IDF; host builds need no setup.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
