use facegan::checkpoint::Checkpoint;
use facegan::layers::Param;
use facegan::math::Matrix;
use facegan::models::{ConvDiscriminator, Discriminator, Generator, MlpGenerator, Network};
use facegan::optim::{Adam, BceWithLogits, Loss, Optimizer};
use facegan::rng::{normal_noise, stream_rng};

const SIZE: usize = 8;

fn train_once(g: &mut MlpGenerator, d: &mut ConvDiscriminator, g_opt: &mut Adam) {
    let z = normal_noise(&mut stream_rng(5, 0), 4, 6);
    let fake = g.forward_train(&z).unwrap();
    let logits = d.forward_train(&fake).unwrap();
    let (_, grad) = BceWithLogits.loss_and_grad(&logits, 0.9);
    let grad_in = d.backward(&grad);
    g.backward(&grad_in);
    let mut params: Vec<&mut Param> = g.parameters_mut();
    g_opt.step(&mut params).unwrap();
}

#[test]
fn round_trip_restores_identical_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let mut g = MlpGenerator::new(6, 12, SIZE, &mut stream_rng(1, 1));
    let mut d = ConvDiscriminator::new(SIZE, 2, &mut stream_rng(1, 2));
    let mut g_opt = Adam::new(2e-4, 0.5, 0.999, 1e-8, 0.0);
    let d_opt = Adam::new(2e-4, 0.5, 0.999, 1e-8, 0.0);
    train_once(&mut g, &mut d, &mut g_opt);

    let ckpt = Checkpoint {
        epoch: 4,
        generator: g.state_dict(),
        discriminator: d.state_dict(),
        g_optimizer: g_opt.state(),
        d_optimizer: d_opt.state(),
        g_losses: vec![0.9, 0.8, 0.85, 0.7],
        d_losses: vec![1.4, 1.3, 1.2, 1.25],
    };
    let path = dir.path().join("ckpt_epoch_4.bin");
    ckpt.save(&path).unwrap();
    let loaded = Checkpoint::load(&path).unwrap();
    assert_eq!(loaded, ckpt);

    let mut g2 = MlpGenerator::new(6, 12, SIZE, &mut stream_rng(77, 1));
    let mut d2 = ConvDiscriminator::new(SIZE, 2, &mut stream_rng(77, 2));
    assert_ne!(g2.state_dict(), g.state_dict());
    g2.load_state_dict(&loaded.generator).unwrap();
    d2.load_state_dict(&loaded.discriminator).unwrap();
    assert_eq!(g2.state_dict(), g.state_dict());
    assert_eq!(d2.state_dict(), d.state_dict());

    g.set_training(false);
    g2.set_training(false);
    let z = normal_noise(&mut stream_rng(9, 0), 3, 6);
    assert_eq!(g.generate(&z).unwrap(), g2.generate(&z).unwrap());
    let x = Matrix::from_vec(2, 3 * SIZE * SIZE, vec![0.3; 2 * 3 * SIZE * SIZE]);
    assert_eq!(d.predict(&x).unwrap(), d2.predict(&x).unwrap());

    let mut opt2 = Adam::new(1.0, 0.0, 0.0, 0.0, 0.0);
    opt2.load_state(&loaded.g_optimizer).unwrap();
    assert_eq!(opt2.state(), g_opt.state());
    assert_eq!(opt2.steps(), 1);
}

#[test]
fn mismatched_architecture_is_rejected() {
    let g = MlpGenerator::new(6, 12, SIZE, &mut stream_rng(1, 1));
    let mut wider = MlpGenerator::new(6, 24, SIZE, &mut stream_rng(1, 1));
    assert!(wider.load_state_dict(&g.state_dict()).is_err());
}
